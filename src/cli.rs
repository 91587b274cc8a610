use clap::{ArgAction, Parser};
use global_depends::config::DEFAULT_CONCURRENCY;
use global_depends::{PolicyError, RepositoryListBuilder, RepositorySpec, ScanConfig, SearchPolicy};
use std::path::PathBuf;
use std::time::Duration;

/// Search all dependencies for the given package.
///
/// Every release in every configured repository is inspected for a
/// `require` or `require-dev` entry on PACKAGE. Without --devs or
/// --releases only development releases (branches) are searched.
///
/// Examples:
///   global-depends psr/log                    # dev releases on packagist.org
///   global-depends -r psr/log --no-packagist --repository https://repo.example.org
#[derive(Parser, Debug)]
#[command(name = "global-depends", author, version, about)]
pub struct Cli {
    /// The depended-upon package name
    #[arg(value_name = "PACKAGE")]
    pub package: String,

    /// Search in all dev-x and x-dev releases
    #[arg(short = 'd', long = "devs")]
    pub devs: bool,

    /// Search in all tagged releases
    #[arg(short = 'r', long = "releases")]
    pub releases: bool,

    /// Additional Composer repository URL, searched before composer.json repositories
    #[arg(long = "repository", value_name = "URL")]
    pub repositories: Vec<String>,

    /// JSON file of package definitions to search
    #[arg(long = "package-file", value_name = "PATH")]
    pub package_files: Vec<PathBuf>,

    /// composer.json whose `repositories` section is used (ignored when missing)
    #[arg(
        long = "composer-json",
        env = "COMPOSER",
        value_name = "PATH",
        default_value = "composer.json"
    )]
    pub composer_json: PathBuf,

    /// Do not search packagist.org
    #[arg(long = "no-packagist")]
    pub no_packagist: bool,

    /// Package metadata fetches kept in flight
    #[arg(
        long,
        env = "GLOBAL_DEPENDS_CONCURRENCY",
        value_name = "N",
        default_value_t = DEFAULT_CONCURRENCY
    )]
    pub concurrency: usize,

    /// Per-fetch timeout in seconds; a timed out fetch is reported like a failed one
    #[arg(long = "timeout", env = "GLOBAL_DEPENDS_TIMEOUT", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print matches, errors and the summary as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v warnings, -vv info, -vvv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn policy(&self) -> Result<SearchPolicy, PolicyError> {
        SearchPolicy::new(self.package.clone(), self.devs, self.releases)
    }

    pub fn scan_config(&self) -> ScanConfig {
        let config = ScanConfig::default().with_concurrency(self.concurrency);
        match self.timeout {
            Some(secs) => config.with_fetch_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }

    pub fn repository_list(&self) -> RepositoryListBuilder {
        let urls = self
            .repositories
            .iter()
            .map(|url| RepositorySpec::Composer { url: url.clone() });
        let files = self
            .package_files
            .iter()
            .map(|path| RepositorySpec::File { path: path.clone() });

        urls.chain(files)
            .fold(RepositoryListBuilder::new(), |builder, spec| {
                builder.with_repository(spec)
            })
            .with_composer_json(self.composer_json.clone())
            .with_packagist(!self.no_packagist)
    }
}

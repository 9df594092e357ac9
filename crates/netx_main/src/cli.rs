use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "netexplainer", version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluates how well language models explain network packet captures")]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, short = 'c', default_value = "netexplainer.yaml")]
    pub config: PathBuf,

    /// Log at debug level.
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,

    /// Let the models call the calculator tool, whatever the configuration
    /// says.
    #[arg(long, default_value_t = false)]
    pub tools: bool,

    /// Download the sample captures listed on the index page into
    /// `<data_dir>/raw` and exit.
    #[arg(long, default_value_t = false, conflicts_with = "clean_data")]
    pub download_data: bool,

    /// Copy raw captures with at most N packets into `<data_dir>/cleaned`
    /// and exit.
    #[arg(long, value_name = "N")]
    pub clean_data: Option<u64>,
}

/// What a single invocation does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Download,
    Clean { max_packets: u64 },
    Evaluate,
}

impl Cli {
    pub fn action(&self) -> Action {
        match (self.download_data, self.clean_data) {
            (true, _) => Action::Download,
            (false, Some(max_packets)) => Action::Clean { max_packets },
            (false, None) => Action::Evaluate,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults_evaluate() {
        let fixture = Cli::try_parse_from(["netexplainer"]).unwrap();
        assert_eq!(fixture.action(), Action::Evaluate);
        assert_eq!(fixture.config, PathBuf::from("netexplainer.yaml"));
        assert!(!fixture.tools);
    }

    #[test]
    fn test_data_flags() {
        let actual = Cli::try_parse_from(["netexplainer", "--download-data"]).unwrap().action();
        assert_eq!(actual, Action::Download);

        let actual = Cli::try_parse_from(["netexplainer", "--clean-data", "200"]).unwrap().action();
        assert_eq!(actual, Action::Clean { max_packets: 200 });
    }

    #[test]
    fn test_data_flags_are_exclusive() {
        let actual = Cli::try_parse_from(["netexplainer", "--download-data", "--clean-data", "5"]);
        assert!(actual.is_err());
    }

    #[test]
    fn test_clean_data_needs_a_number() {
        assert!(Cli::try_parse_from(["netexplainer", "--clean-data", "many"]).is_err());
    }

    #[test]
    fn test_tools_and_config() {
        let fixture =
            Cli::try_parse_from(["netexplainer", "--tools", "-c", "other.yaml", "-v"]).unwrap();
        assert!(fixture.tools);
        assert!(fixture.verbose);
        assert_eq!(fixture.config, PathBuf::from("other.yaml"));
    }
}

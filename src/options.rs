use clap::Parser;

/// Poll BYD HVS/HVM/LVS battery controllers and print their state as JSON
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Pretty-print the JSON output
    #[clap(short = 'p', long = "pretty")]
    pub pretty: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}

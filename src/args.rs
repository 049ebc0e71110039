use clap::Parser;

/// Exports the confirmed votes of an eVACS ballot database to CSV files, with
/// the position at which every candidate was shown to the voter.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. See the README for the
    /// accepted keys. Paths in the file are relative to the file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The SQLite ballot database. Setting this option overrides the
    /// databasePath of the configuration.
    #[clap(short, long, value_parser)]
    pub database: Option<String>,

    /// (directory, default /tmp/evacs_export/confirmed_votes) Where the CSV files
    /// are written. Setting this option overrides the outputDirectory of the
    /// configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (directory, optional) A directory with the files of a previous export. If
    /// provided, every written file is compared with the file of the same name,
    /// and the run fails on any difference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

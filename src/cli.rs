//! CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cmin")]
#[command(about = "Minify a C program down to what main still reaches", long_about = None)]
pub struct Cli {
    /// Comma-separated bit widths of char, short, int, long and long long
    /// (for example 8,16,32,64,64)
    #[arg(value_name = "BITS")]
    pub bits: String,

    /// C source file to minify
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output path; stdout when omitted. An output newer than the input
    /// is left untouched.
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,
}

// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDate;
use clap::{Args, Subcommand};

use crate::init::parse;

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Scan the log file of this day (YYYYMMDD) instead of today's. The
    /// checkpoint only moves if it already names that day's file.
    #[arg(long, value_parser = parse::parse_date)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointCommand {
    /// Print the stored checkpoint
    Show,
    /// Delete the stored checkpoint; the next run starts at the first record
    Reset,
}

//-
// Copyright (c) 2024, The Bucketmail Authors
//
// This file is part of Bucketmail.
//
// Bucketmail is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Bucketmail is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along
// with Bucketmail. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use serde::Serialize;
use structopt::StructOpt;

use crate::account::blob::FsBlobStore;
use crate::account::mailbox::{Mailbox, Query};
use crate::mime::parser;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

macro_rules! die {
    ($ex:ident, $($stuff:tt)*) => {{
        eprintln!($($stuff)*);
        crate::support::sysexits::$ex.exit()
    }}
}

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Parse a message and print its structure as JSON.
    Parse(ParseSubcommand),
    /// Search a folder of a user's mailbox.
    ///
    /// The query is a JSON object, e.g.
    /// '{"headers": {"from": "alice"}, "flags": {"not": "\\Seen"}}'.
    Search(SearchSubcommand),
    /// Pull newly arrived messages into INBOX and save the mailbox.
    Refresh(CommonOptions),
    /// List the folders of a user's mailbox matching a pattern.
    List(ListSubcommand),
}

#[derive(StructOpt)]
struct ParseSubcommand {
    /// The message to parse, or `-` for standard input.
    #[structopt(parse(from_os_str))]
    file: PathBuf,
}

#[derive(StructOpt)]
struct CommonOptions {
    /// The directory containing `bucketmail.toml` and optionally
    /// `logging.toml`. [default: current directory]
    #[structopt(long, parse(from_os_str))]
    root: Option<PathBuf>,

    /// Log more. May be given more than once.
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,

    /// The user whose mailbox to open.
    user: String,
}

#[derive(StructOpt)]
struct SearchSubcommand {
    #[structopt(flatten)]
    common: CommonOptions,

    /// The folder to search.
    #[structopt(short, long, default_value = "INBOX")]
    folder: String,

    /// The query, as JSON.
    query: String,
}

#[derive(StructOpt)]
struct ListSubcommand {
    #[structopt(flatten)]
    common: CommonOptions,

    /// The namespace to list in. Empty means the personal namespace,
    /// including INBOX.
    #[structopt(long, default_value = "")]
    reference: String,

    /// The pattern to match. `*` matches anything and `%` anything but the
    /// hierarchy separator.
    #[structopt(default_value = "*")]
    pattern: String,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    match cmd {
        Command::Parse(cmd) => parse(cmd),
        Command::Search(cmd) => search(cmd),
        Command::Refresh(common) => refresh(common),
        Command::List(cmd) => list(cmd),
    }
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => die!(EX_SOFTWARE, "Failed to format output: {}", e),
    }
}

fn parse(cmd: ParseSubcommand) {
    crate::init_simple_log(log::LevelFilter::Warn);

    let mut raw = Vec::new();
    let result = if cmd.file.as_os_str() == "-" {
        io::stdin().read_to_end(&mut raw).map(|_| ())
    } else {
        fs::File::open(&cmd.file)
            .and_then(|mut f| f.read_to_end(&mut raw).map(|_| ()))
    };
    if let Err(e) = result {
        die!(EX_NOINPUT, "Error reading '{}': {}", cmd.file.display(), e);
    }

    print_json(&parser::parse(&raw));
}

fn init_logging(root: &Path, verbose: u8) {
    if Ok(true) == nix::unistd::isatty(2) {
        // Running interactively; ignore logging configuration and just write
        // to stderr.
        crate::init_simple_log(match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        });
        return;
    }

    // Either log4rs or syslog, since log4rs has no syslog appender of its
    // own.
    let log_config_file = root.join("logging.toml");
    if log_config_file.is_file() {
        if let Err(e) = log4rs::init_file(
            &log_config_file,
            log4rs::file::Deserializers::new(),
        ) {
            die!(
                EX_CONFIG,
                "Failed to initialise logging from '{}': {}",
                log_config_file.display(),
                e
            );
        }
    } else {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_MAIL,
            hostname: None,
            process: env!("CARGO_PKG_NAME").to_owned(),
            pid: nix::unistd::getpid().as_raw(),
        };

        match syslog::unix(formatter) {
            Ok(logger) => {
                let _ = log::set_boxed_logger(Box::new(
                    syslog::BasicLogger::new(logger),
                ))
                .map(|_| log::set_max_level(log::LevelFilter::Info));
            },
            // Nowhere to log to, but that shouldn't stop the command
            Err(e) => eprintln!("Failed to connect to syslog: {}", e),
        }
    }
}

fn load_config(root: &Path) -> SystemConfig {
    let path = root.join("bucketmail.toml");
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if io::ErrorKind::NotFound == e.kind() => {
            return SystemConfig::default()
        },
        Err(e) => die!(EX_CONFIG, "Error reading '{}': {}", path.display(), e),
    };

    SystemConfig::parse(&raw).unwrap_or_else(|e| {
        die!(EX_CONFIG, "Error in config file at '{}': {}", path.display(), e)
    })
}

fn open_mailbox(common: &CommonOptions) -> Mailbox {
    let root = common.root.clone().unwrap_or_else(|| PathBuf::from("."));
    let config = load_config(&root);
    init_logging(&root, common.verbose);

    let bucket = config.storage.bucket_for(&common.user);
    let log_prefix = LogPrefix::new("cli".to_owned());
    log_prefix.set_user(common.user.clone());
    log_prefix.set_bucket(bucket.clone());

    // A relative blob root is relative to the configuration
    let bucket_root = root.join(&config.storage.blob_root).join(&bucket);
    let store = match FsBlobStore::open(bucket_root, config.storage.page_size)
    {
        Ok(store) => store,
        Err(e) => {
            die!(EX_IOERR, "{} Failed to open blob store: {}", log_prefix, e)
        },
    };

    match Mailbox::open(log_prefix, Arc::new(config), Arc::new(store)) {
        Ok(mb) => mb,
        Err(e @ Error::Json(..)) => {
            die!(EX_DATAERR, "Mailbox snapshot is corrupt: {}", e)
        },
        Err(e) => die!(EX_IOERR, "Failed to open mailbox: {}", e),
    }
}

fn search(cmd: SearchSubcommand) {
    let query = match Query::parse(&cmd.query) {
        Ok(query) => query,
        Err(e) => die!(EX_USAGE, "Bad query: {}", e),
    };

    let mut mb = open_mailbox(&cmd.common);
    // Any content the query looks at is fetched on the way
    match mb.search(&cmd.folder, &query) {
        Ok(hits) => print_json(&hits),
        Err(e) => die!(EX_DATAERR, "{}: {}", cmd.folder, e),
    }
}

fn refresh(common: CommonOptions) {
    // Opening the mailbox already pulls in new messages
    let mb = open_mailbox(&common);
    if let Err(e) = mb.save() {
        die!(EX_IOERR, "{} Failed to save mailbox: {}", mb.log_prefix(), e);
    }

    match mb.folder_status("INBOX") {
        Ok(status) => {
            info!(
                "{} INBOX has {} message(s), {} unseen",
                mb.log_prefix(),
                status.messages,
                status.unseen
            );
            print_json(&status);
        },
        Err(e) => die!(EX_SOFTWARE, "INBOX: {}", e),
    }
}

fn list(cmd: ListSubcommand) {
    let mb = open_mailbox(&cmd.common);
    for folder in mb.list_folders(&cmd.reference, &cmd.pattern) {
        println!(
            "({}) {:?} {}",
            folder.flags.join(" "),
            folder.separator.unwrap_or('/'),
            folder.path
        );
    }
}

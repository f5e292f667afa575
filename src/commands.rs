//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

fn index_list() -> Arg {
    Arg::new("indexes")
        .long("indexes")
        .short('i')
        .help("Comma-separated indexes (default: all)")
        .value_delimiter(',')
}

fn catalog() -> Arg {
    Arg::new("catalog")
        .long("catalog")
        .help("JSON catalog snapshot to read entities from")
        .required(true)
}

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("musearch")
        .about("Build, update and query music catalog search indexes")
        .version(clap::crate_version!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("Configuration file (default: musearch.toml)")
                .global(true),
        )
        .arg(
            Arg::new("indexes-dir")
                .long("indexes-dir")
                .help("Directory holding the indexes (overrides the config file)")
                .global(true),
        )
        .subcommand(build_build())
        .subcommand(build_update())
        .subcommand(build_search())
        .subcommand(
            Command::new("check-file-limit")
                .about("Check that the open-file limit allows a full build"),
        )
        .subcommand(
            Command::new("init-config").about("Write a commented default configuration file"),
        )
}

fn build_build() -> Command {
    Command::new("build")
        .about("Build indexes from scratch")
        .arg(catalog())
        .arg(index_list())
        .arg(
            Arg::new("chunk-size")
                .long("chunk-size")
                .help("Ids per chunk")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .help("Document-building threads")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("test")
                .long("test")
                .help("Cap every index at --test-index-size ids")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-index-size")
                .long("test-index-size")
                .help("Highest id built in test mode")
                .value_parser(clap::value_parser!(u32)),
        )
}

fn build_update() -> Command {
    let cmd = Command::new("update")
        .about("Apply replication changes to built indexes")
        .arg(catalog())
        .arg(index_list())
        .arg(
            Arg::new("packets")
                .long("packets")
                .help("Directory of replication-<N>.tar.zst packets"),
        )
        .arg(
            Arg::new("changelog")
                .long("changelog")
                .help("SQLite database holding the live change log")
                .conflicts_with("packets"),
        );
    #[cfg(feature = "http")]
    let cmd = cmd.arg(
        Arg::new("packet-url")
            .long("packet-url")
            .help("Base URL serving replication packets")
            .conflicts_with_all(["packets", "changelog"]),
    );
    cmd
}

fn build_search() -> Command {
    Command::new("search")
        .about("Run a query against one index")
        .arg(
            Arg::new("index")
                .help("Index to search")
                .required(true),
        )
        .arg(Arg::new("query").help("Query text").required(true))
        .arg(
            Arg::new("offset")
                .long("offset")
                .default_value("0")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .help("Hits per page (default from config)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("explain")
                .long("explain")
                .help("Print the compiled query")
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_tree_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_build_arguments() {
        let m = build_cli()
            .try_get_matches_from([
                "musearch",
                "build",
                "--catalog",
                "db.json",
                "--indexes",
                "artist,label",
                "--chunk-size",
                "100",
                "--test",
            ])
            .unwrap();
        let (name, sub) = m.subcommand().unwrap();
        assert_eq!(name, "build");
        let indexes: Vec<&String> = sub.get_many::<String>("indexes").unwrap().collect();
        assert_eq!(indexes, vec!["artist", "label"]);
        assert_eq!(sub.get_one::<u32>("chunk-size"), Some(&100));
        assert!(sub.get_flag("test"));
    }

    #[test]
    fn test_update_sources_conflict() {
        let result = build_cli().try_get_matches_from([
            "musearch",
            "update",
            "--catalog",
            "db.json",
            "--packets",
            "p",
            "--changelog",
            "c.db",
        ]);
        assert!(result.is_err());
    }
}

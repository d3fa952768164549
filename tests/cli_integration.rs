use pt::{Command, Invocation, PrOptions, parse_args};

fn parse(args: &[&str]) -> anyhow::Result<Invocation> {
    parse_args(std::iter::once("pt").chain(args.iter().copied()))
}

#[test]
fn test_pr_defaults() {
    let invocation = parse(&["pr"]).unwrap();
    assert_eq!(
        invocation,
        Invocation {
            command: Command::Pr(PrOptions::default()),
            debug: false,
        }
    );
}

#[test]
fn test_pr_flags() {
    let invocation = parse(&["pr", "--draft", "--auto-merge"]).unwrap();
    assert_eq!(
        invocation.command,
        Command::Pr(PrOptions {
            draft: true,
            auto_merge: true,
        })
    );
}

#[test]
fn test_select_commit() {
    let invocation = parse(&["select-commit"]).unwrap();
    assert_eq!(invocation.command, Command::SelectCommit);
}

#[test]
fn test_debug_is_global() {
    assert!(parse(&["--debug", "pr"]).unwrap().debug);
    assert!(parse(&["select-commit", "--debug"]).unwrap().debug);
}

#[test]
fn test_subcommand_is_required() {
    let err = parse(&[]).unwrap_err();
    assert!(err.downcast_ref::<clap::Error>().is_some());
}

#[test]
fn test_unknown_flag_is_rejected() {
    let err = parse(&["pr", "--draftt"]).unwrap_err();
    let clap_err = err.downcast_ref::<clap::Error>().unwrap();
    assert_eq!(clap_err.kind(), clap::error::ErrorKind::UnknownArgument);
}

#[test]
fn test_help_is_a_clap_error() {
    let err = parse(&["--help"]).unwrap_err();
    let clap_err = err.downcast_ref::<clap::Error>().unwrap();
    assert_eq!(clap_err.kind(), clap::error::ErrorKind::DisplayHelp);
}

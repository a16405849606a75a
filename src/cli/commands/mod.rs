use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("days")
                .default_value("30")
                .env("CERTPULSE_DAYS")
                .help("report certificates expiring within this many days")
                .long("days")
                .short('d')
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("nonexpiring")
                .action(ArgAction::SetTrue)
                .env("CERTPULSE_NONEXPIRING")
                .help("also report certificates that are not expiring soon")
                .long("nonexpiring"),
        )
        .arg(
            Arg::new("kubeconfig")
                .help("path to the kubeconfig file, KUBECONFIG or ~/.kube/config when unset")
                .long("kubeconfig")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("context")
                .help("kubeconfig context to use")
                .long("context"),
        )
        .arg(
            Arg::new("namespace")
                .help("only scan this namespace, all namespaces when unset")
                .long("namespace"),
        )
        .arg(
            Arg::new("from-file")
                .conflicts_with_all(["kubeconfig", "context", "namespace"])
                .help("scan the output of `kubectl get secrets -A -o json` instead of a cluster")
                .long("from-file")
                .short('f')
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("workers")
                .default_value("8")
                .env("CERTPULSE_WORKERS")
                .help("number of secrets fetched concurrently")
                .long("workers")
                .short('w')
                .value_parser(clap::value_parser!(u16).range(1..)),
        )
        .arg(
            Arg::new("timeout")
                .env("CERTPULSE_TIMEOUT")
                .help("stop fetching secrets after this many seconds")
                .long("timeout")
                .short('t')
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("at")
                .help("evaluate expiry at this RFC 3339 time instead of now")
                .long("at"),
        )
        .arg(
            Arg::new("output")
                .default_value("text")
                .env("CERTPULSE_OUTPUT")
                .help("output format")
                .long("output")
                .short('o')
                .value_parser(["text", "json"]),
        )
        .arg(
            Arg::new("metrics-file")
                .env("CERTPULSE_METRICS_FILE")
                .help("write Prometheus metrics to this file after the scan")
                .long("metrics-file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbose")
                .action(ArgAction::Count)
                .help("increase log verbosity (-v, -vv, -vvv)")
                .long("verbose")
                .short('v'),
        )
}

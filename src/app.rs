use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{error::ErrorKind, CommandFactory, Parser};
use tokio::task;
use tracing::{info, warn};

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::connection::{ConnectionSettings, HttpTransport, Throttle, DEFAULT_USER_AGENT};
use crate::dictionary::{Dictionary, DictionaryConfig, WordlistSource};
use crate::fuzzer::Fuzzer;
use crate::output::{self, FileReport, OutputFormat};
use crate::prober::{Blacklist, ProbeOptions, Prober, StatusPolicy, DEFAULT_MAX_RETRIES};
use crate::reporter::{Console, OutputSettings, Reporter};
use crate::target::Target;
use crate::utils;

const DEFAULT_THREADS: usize = 10;
const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

fn print_banner(console: &Console) {
    const BANNER: &str = r#"
       ___
  ____/ (_)_____________      _____  ___  ____
 / __  / / ___/ ___/ | /| / / _ \/ _ \/ __ \
/ /_/ / / /  (__  )| |/ |/ /  __/  __/ /_/ /
\__,_/_/_/  /____/ |__/|__/\___/\___/ .___/
                                   /_/      "#;
    console.line(BANNER);
    console.line(&format!(
        "       v{} - concurrent content discovery\n",
        env!("CARGO_PKG_VERSION")
    ));
}

fn format_kv_line(label: &str, value: &str) -> String {
    format!(":: {:<12}: {}", label, value)
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn render_custom_help() -> String {
    let cmd = CliArgs::command();
    let mut out = String::new();

    out.push_str(cmd.get_name());
    if let Some(version) = cmd.get_version() {
        out.push(' ');
        out.push_str(version);
    }
    out.push('\n');
    if let Some(long_about) = cmd.get_long_about().or(cmd.get_about()) {
        out.push('\n');
        out.push_str(&long_about.to_string());
        out.push('\n');
    }
    out.push_str(&format!("\nUsage: {} [OPTIONS]\n\n", cmd.get_name()));

    let mut headings: Vec<&str> = Vec::new();
    for arg in cmd.get_arguments().filter(|a| !a.is_hide_set()) {
        let heading = arg.get_help_heading().unwrap_or("Options");
        if !headings.contains(&heading) {
            headings.push(heading);
        }
    }

    for heading in headings {
        out.push_str(heading);
        out.push_str(":\n");
        let args = cmd
            .get_arguments()
            .filter(|a| !a.is_hide_set() && a.get_help_heading().unwrap_or("Options") == heading);
        for arg in args {
            let mut names: Vec<String> = Vec::new();
            if let Some(short) = arg.get_short() {
                names.push(format!("-{short}"));
            }
            if let Some(long) = arg.get_long() {
                names.push(format!("--{long}"));
            }
            for alias in arg.get_visible_aliases().unwrap_or_default() {
                let rendered = format!("--{alias}");
                if !names.contains(&rendered) {
                    names.push(rendered);
                }
            }
            let mut flags = names.join(", ");
            if arg.get_action().takes_values() {
                let value_name = arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|name| name.as_str())
                    .unwrap_or("VALUE");
                flags.push_str(&format!(" <{value_name}>"));
            }
            out.push_str(&format!("  {flags}\n"));
            if let Some(help) = arg.get_help() {
                out.push_str(&format!("          {}\n", help.to_string().trim()));
            }
            out.push('\n');
        }
    }

    out
}

fn init_tracing(verbose: u8, colors: bool) {
    let default_level = match verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(colors)
        .with_env_filter(filter)
        .try_init();
}

/// `colored` runs its own TTY check; the resolved choice wins over it.
fn init_colors(colors: bool) {
    colored::control::set_override(colors);
}

#[derive(Clone, Debug)]
struct RunConfig {
    url: String,
    ip: Option<IpAddr>,
    dictionary: DictionaryConfig,
    threads: usize,
    max_retries: u32,
    timeout: Duration,
    delay: Duration,
    rate: Option<u32>,
    max_time: Option<Duration>,
    method: reqwest::Method,
    user_agent: String,
    headers: Vec<(String, String)>,
    proxy: Option<String>,
    follow_redirects: bool,
    exclude_server_errors: bool,
    exclude_status: HashSet<u16>,
    blacklist_dir: Option<String>,
    output: Option<(String, OutputFormat)>,
    output_settings: OutputSettings,
    verbose: u8,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let url = args
        .url
        .or(cfg.url)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| "a target must be specified (--url)".to_string())?;

    let ip = match args.ip.or(cfg.ip) {
        Some(raw) => Some(
            raw.parse::<IpAddr>()
                .map_err(|_| format!("invalid ip '{raw}', expected an IP address"))?,
        ),
        None => None,
    };

    let wordlist = args
        .wordlist
        .or(cfg.wordlist)
        .map(|p| config::expand_tilde_string(&p))
        .ok_or_else(|| "a wordlist must be specified (--wordlist)".to_string())?;
    let extensions = match args.extensions.or(cfg.extensions) {
        Some(raw) => utils::parse_extensions_csv(&raw)
            .map_err(|e| format!("invalid --extensions '{raw}': {e}"))?,
        None => Vec::new(),
    };
    let dictionary = DictionaryConfig {
        extensions,
        force_extensions: args.force_extensions || cfg.force_extensions.unwrap_or(false),
        lowercase: args.lowercase || cfg.lowercase.unwrap_or(false),
        prefixes: args
            .prefixes
            .or(cfg.prefixes)
            .map(|raw| utils::parse_list_csv(&raw))
            .unwrap_or_default(),
        suffixes: args
            .suffixes
            .or(cfg.suffixes)
            .map(|raw| utils::parse_list_csv(&raw))
            .unwrap_or_default(),
        ..DictionaryConfig::new(WordlistSource::FilePath(wordlist))
    };

    let threads = args.threads.or(cfg.threads).unwrap_or(DEFAULT_THREADS);
    if threads == 0 {
        return Err("invalid threads, expected positive integer".to_string());
    }
    let max_retries = args
        .max_retries
        .or(cfg.max_retries)
        .unwrap_or(DEFAULT_MAX_RETRIES);
    let timeout_secs = args.timeout.or(cfg.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS);
    let timeout = Duration::try_from_secs_f64(timeout_secs)
        .ok()
        .filter(|t| !t.is_zero())
        .ok_or_else(|| format!("invalid timeout '{timeout_secs}'"))?;
    let delay_secs = args.delay.or(cfg.delay).unwrap_or(0.0);
    let delay = Duration::try_from_secs_f64(delay_secs)
        .map_err(|_| format!("invalid delay '{delay_secs}'"))?;
    let rate = args.rate.or(cfg.rate).filter(|r| *r > 0);
    let max_time = args
        .max_time
        .or(cfg.max_time)
        .filter(|s| *s > 0)
        .map(Duration::from_secs);

    let method_raw = args.method.or(cfg.method).unwrap_or_else(|| "GET".to_string());
    let method = utils::parse_http_method(&method_raw)
        .map_err(|e| format!("invalid --method '{method_raw}': {e}"))?;
    let user_agent = args
        .user_agent
        .or(cfg.user_agent)
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
    let header_lines = if args.header.is_empty() {
        cfg.headers.unwrap_or_default()
    } else {
        args.header
    };
    let headers = header_lines
        .iter()
        .map(|raw| utils::parse_header(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let proxy = args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty());
    let follow_redirects = args.follow_redirects || cfg.follow_redirects.unwrap_or(false);

    let exclude_server_errors =
        args.exclude_server_errors || cfg.exclude_server_errors.unwrap_or(false);
    let exclude_status = match args.exclude_status.or(cfg.exclude_status) {
        Some(raw) => utils::parse_u16_set_csv(&raw)
            .map_err(|e| format!("invalid --exclude-status '{raw}': {e}"))?,
        None => HashSet::new(),
    };
    let blacklist_dir = args
        .blacklist_dir
        .or(cfg.blacklist_dir)
        .map(|p| config::expand_tilde_string(&p));

    let output_format = match args.output_format.or(cfg.output_format) {
        Some(raw) => Some(OutputFormat::parse(&raw).ok_or_else(|| {
            format!("invalid --output-format '{raw}', expected plain, json or html")
        })?),
        None => None,
    };
    let output = args
        .output
        .or(cfg.output)
        .map(|p| config::expand_tilde_string(&p))
        .map(|path| {
            let format = output_format
                .or_else(|| output::infer_format_from_path(&path))
                .unwrap_or(OutputFormat::Plain);
            (path, format)
        });

    let colors = if args.color {
        true
    } else {
        !(args.no_color || cfg.no_color.unwrap_or(false))
    };
    let output_settings = OutputSettings {
        colors,
        progress: !(args.no_progress || cfg.no_progress.unwrap_or(false)),
        quiet: args.quiet || cfg.quiet.unwrap_or(false),
    };

    Ok(RunConfig {
        url,
        ip,
        dictionary,
        threads,
        max_retries,
        timeout,
        delay,
        rate,
        max_time,
        method,
        user_agent,
        headers,
        proxy,
        follow_redirects,
        exclude_server_errors,
        exclude_status,
        blacklist_dir,
        output,
        output_settings,
        verbose: args.verbose,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Completed,
    Interrupted,
    TimedOut,
}

/// Waits for the pool to drain, or stops it on Ctrl-C or when `max_time` elapses.
async fn supervise(fuzzer: Arc<Fuzzer>, max_time: Option<Duration>) -> Outcome {
    let waiter = {
        let fuzzer = fuzzer.clone();
        task::spawn_blocking(move || fuzzer.wait())
    };
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let deadline = async {
        match max_time {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    let outcome = tokio::select! {
        _ = waiter => Outcome::Completed,
        _ = interrupt => Outcome::Interrupted,
        _ = deadline => Outcome::TimedOut,
    };

    if outcome != Outcome::Completed {
        match outcome {
            Outcome::Interrupted => fuzzer.reporter().console().line("\n:: Canceled by the user"),
            _ => fuzzer
                .reporter()
                .console()
                .line("\n:: Max time reached, stopping"),
        }
        let stopper = fuzzer.clone();
        if let Err(e) = task::spawn_blocking(move || stopper.stop()).await {
            warn!(error = %e, "stop task failed");
        }
    }
    outcome
}

fn run(run: RunConfig) -> Result<(), String> {
    init_tracing(run.verbose, run.output_settings.colors);
    init_colors(run.output_settings.colors);

    let target = Target::parse(&run.url, run.ip).map_err(|e| e.to_string())?;
    let base_url = target.base_url();

    let dictionary = Dictionary::load(run.dictionary.clone()).map_err(|e| e.to_string())?;
    let blacklist = match run.blacklist_dir.as_deref() {
        Some(dir) => Blacklist::load_dir(
            Path::new(dir),
            &run.dictionary.extensions,
            run.dictionary.lowercase,
        )
        .map_err(|e| e.to_string())?,
        None => Blacklist::new(),
    };

    let settings = ConnectionSettings {
        timeout: run.timeout,
        proxy: run.proxy.clone(),
        follow_redirects: run.follow_redirects,
        user_agent: run.user_agent.clone(),
        headers: run.headers.clone(),
        pool_size: run.threads,
        resolve: target.pinned_host(),
    };
    let transport = HttpTransport::new(&settings).map_err(|e| e.to_string())?;

    let throttle = Throttle::new(run.delay, run.rate);
    let throttled = throttle.is_limited();
    let options = ProbeOptions {
        method: run.method.clone(),
        max_retries: run.max_retries,
        policy: StatusPolicy::new(run.exclude_server_errors)
            .with_excluded(run.exclude_status.clone()),
        blacklist,
        throttle,
        ..ProbeOptions::new(base_url.clone())
    };
    let prober = Prober::new(Arc::new(transport), options);

    let console = Console::stdout(run.output_settings);
    print_banner(&console);
    let summary = [
        ("Method", run.method.to_string()),
        ("URL", base_url.clone()),
        ("Address", target.socket_addr().to_string()),
        ("Wordlist", format!("{} entries", dictionary.len())),
        ("Threads", run.threads.to_string()),
        ("Retries", run.max_retries.to_string()),
        ("Timeout", format!("{}s", run.timeout.as_secs_f64())),
        ("Throttled", format_bool(throttled).to_string()),
        ("Redirects", format_bool(run.follow_redirects).to_string()),
        (
            "Output",
            run.output
                .as_ref()
                .map(|(path, format)| format!("{path} ({format:?})"))
                .unwrap_or_else(|| "-".to_string()),
        ),
    ];
    for (label, value) in summary {
        console.line(&format_kv_line(label, &value));
    }
    console.line("");

    let reporter = Arc::new(Reporter::new(console));
    if let Some((path, format)) = run.output.as_ref() {
        reporter.attach(Box::new(FileReport::new(*format, path, base_url.clone())));
    }

    let fuzzer = Arc::new(
        Fuzzer::new(
            run.threads,
            Arc::new(dictionary),
            Arc::new(prober),
            reporter.clone(),
        )
        .map_err(|e| e.to_string())?,
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    let started = Instant::now();
    fuzzer.start().map_err(|e| e.to_string())?;
    let outcome = rt.block_on(supervise(fuzzer.clone(), run.max_time));
    drop(rt);
    info!(?outcome, "run finished");

    let report_result = reporter.finish();
    let findings = reporter.findings().len();
    let errors = reporter.error_count();
    drop(fuzzer);

    reporter.console().line(&format!(
        "\n:: Completed :: {} found, {} errors, took {}s ::",
        findings,
        errors,
        started.elapsed().as_secs()
    ));
    report_result.map_err(|e| e.to_string())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                print!("{}", render_custom_help());
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                print!("{}", CliArgs::command().render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let explicit_config = args.config.is_some();
    let config_path = match args.config.as_deref() {
        Some(path) => Some(config::expand_tilde(path)),
        None => config::default_config_path(),
    };

    if args.init_config {
        let path = config_path.ok_or_else(|| "could not determine config path".to_string())?;
        config::ensure_default_config_file(&path)?;
        println!("config written to {}", path.display());
        return Ok(());
    }

    let cfg = match config_path.as_ref() {
        Some(path) => config::load_config(path, !explicit_config)?,
        None => ConfigFile::default(),
    };

    run(build_run_config(args, cfg)?)
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use crate::reporter::Finding;

    fn parse(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["dirsweep", "-u", "http://example.com/", "-w", "words.txt"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn defaults_apply_without_config() {
        let run = build_run_config(parse(&[]), ConfigFile::default()).unwrap();
        assert_eq!(run.threads, DEFAULT_THREADS);
        assert_eq!(run.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(run.timeout, Duration::from_secs(30));
        assert_eq!(run.delay, Duration::ZERO);
        assert_eq!(run.method, reqwest::Method::GET);
        assert!(run.output.is_none());
        assert!(run.output_settings.colors);
    }

    #[test]
    fn cli_overrides_config() {
        let cfg = ConfigFile {
            threads: Some(4),
            method: Some("POST".to_string()),
            ..ConfigFile::default()
        };
        let run = build_run_config(parse(&["-t", "25"]), cfg).unwrap();
        assert_eq!(run.threads, 25);
        assert_eq!(run.method, reqwest::Method::POST);
    }

    #[test]
    fn missing_target_or_wordlist_is_an_error() {
        let args = CliArgs::parse_from(["dirsweep", "-w", "words.txt"]);
        assert!(build_run_config(args, ConfigFile::default()).is_err());
        let args = CliArgs::parse_from(["dirsweep", "-u", "example.com"]);
        assert!(build_run_config(args, ConfigFile::default()).is_err());
    }

    #[test]
    fn output_format_is_inferred_or_explicit() {
        let run = build_run_config(parse(&["-o", "out.json"]), ConfigFile::default()).unwrap();
        assert_eq!(run.output.unwrap().1, OutputFormat::Json);

        let run = build_run_config(
            parse(&["-o", "out.json", "--output-format", "html"]),
            ConfigFile::default(),
        )
        .unwrap();
        assert_eq!(run.output.unwrap().1, OutputFormat::Html);

        let run = build_run_config(parse(&["-o", "report"]), ConfigFile::default()).unwrap();
        assert_eq!(run.output.unwrap().1, OutputFormat::Plain);
    }

    #[test]
    fn color_flag_beats_no_color() {
        let run = build_run_config(parse(&["--no-color"]), ConfigFile::default()).unwrap();
        assert!(!run.output_settings.colors);
        let run = build_run_config(parse(&["--no-color", "--color"]), ConfigFile::default()).unwrap();
        assert!(run.output_settings.colors);
    }

    #[test]
    fn headers_and_extensions_are_parsed() {
        let run = build_run_config(
            parse(&["-H", "Cookie: a=b", "-H", "X-Test:1", "-e", ".php,bak"]),
            ConfigFile::default(),
        )
        .unwrap();
        assert_eq!(
            run.headers,
            vec![
                ("Cookie".to_string(), "a=b".to_string()),
                ("X-Test".to_string(), "1".to_string())
            ]
        );
        assert_eq!(run.dictionary.extensions, vec!["php", "bak"]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(build_run_config(parse(&["-t", "0"]), ConfigFile::default()).is_err());
        assert!(build_run_config(parse(&["--timeout", "0"]), ConfigFile::default()).is_err());
        assert!(build_run_config(parse(&["--ip", "nope"]), ConfigFile::default()).is_err());
        assert!(build_run_config(parse(&["--exclude-status", "abc"]), ConfigFile::default()).is_err());
        assert!(build_run_config(parse(&["-H", "novalue"]), ConfigFile::default()).is_err());
    }

    #[test]
    fn help_lists_headings_and_aliases() {
        let help = render_custom_help();
        assert!(help.contains("Dictionary:"));
        assert!(help.contains("--wordlist"));
        assert!(help.contains("--max-retries"));
    }

    #[test]
    fn kv_line_is_aligned() {
        assert_eq!(format_kv_line("Threads", "10"), ":: Threads     : 10");
    }

    #[test]
    fn color_choice_overrides_terminal_detection() {
        init_colors(true);
        let settings = OutputSettings {
            progress: false,
            ..OutputSettings::default()
        };
        let console = Console::new(settings, Box::new(std::io::sink()));
        let line = console.format_finding(&Finding {
            path: "admin".to_string(),
            status: 200,
            location: None,
            content_length: None,
        });
        assert!(line.contains('\u{1b}'), "{line:?}");
    }
}

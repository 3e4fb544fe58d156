use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dirsweep",
    version,
    about = "concurrent web content discovery",
    long_about = "dirsweep brute-forces paths on a web server with a pool of worker threads and reports the interesting responses.\n\nExamples:\n  dirsweep -u https://target.tld/ -w words.txt\n  dirsweep -u https://target.tld/app -w words.txt -e php,bak -t 40\n  dirsweep -u target.tld -w words.txt -o report.json --max-time 600\n\nTip: Use --config to persist scan settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv, -vvv). RUST_LOG takes precedence."
    )]
    pub verbose: u8,

    #[arg(
        short = 'c',
        long = "clr",
        visible_alias = "color",
        help_heading = "Output",
        help = "Enable colored output (overrides --no-color)."
    )]
    pub color: bool,

    #[arg(
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'q',
        long = "qt",
        visible_alias = "quiet",
        help_heading = "Output",
        help = "Do not print findings or errors to the terminal."
    )]
    pub quiet: bool,

    #[arg(
        long = "np",
        visible_alias = "no-progress",
        help_heading = "Output",
        help = "Hide the progress line."
    )]
    pub no_progress: bool,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write a report to FILE when the run ends."
    )]
    pub output: Option<String>,

    #[arg(
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Report format: plain, json or html (inferred from the file extension)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'u',
        long = "u",
        visible_alias = "url",
        value_name = "URL",
        help_heading = "Target",
        help = "Target base URL. Scheme defaults to http."
    )]
    pub url: Option<String>,

    #[arg(
        long = "ip",
        value_name = "ADDR",
        help_heading = "Target",
        help = "Connect to this IP instead of resolving the host."
    )]
    pub ip: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Target",
        help = "Path to config file (defaults to ~/.dirsweep/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "init-config",
        help_heading = "Target",
        help = "Write a default config file to the --config path (or ~/.dirsweep/config.yml) and exit."
    )]
    pub init_config: bool,

    #[arg(
        short = 'w',
        long = "wl",
        visible_alias = "wordlist",
        value_name = "FILE",
        help_heading = "Dictionary",
        help = "Wordlist file, one path per line."
    )]
    pub wordlist: Option<String>,

    #[arg(
        short = 'e',
        long = "extensions",
        visible_alias = "ext",
        value_name = "EXTS",
        help_heading = "Dictionary",
        help = "Extensions substituted for %EXT% (comma-separated, e.g. php,bak)."
    )]
    pub extensions: Option<String>,

    #[arg(
        short = 'f',
        long = "fe",
        visible_alias = "force-extensions",
        help_heading = "Dictionary",
        help = "Also append every extension to words without %EXT%."
    )]
    pub force_extensions: bool,

    #[arg(
        short = 'L',
        long = "lc",
        visible_alias = "lowercase",
        help_heading = "Dictionary",
        help = "Lowercase every entry (duplicates are dropped)."
    )]
    pub lowercase: bool,

    #[arg(
        long = "pfx",
        visible_alias = "prefixes",
        value_name = "LIST",
        help_heading = "Dictionary",
        help = "Prefixes added to every entry (comma-separated)."
    )]
    pub prefixes: Option<String>,

    #[arg(
        long = "sfx",
        visible_alias = "suffixes",
        value_name = "LIST",
        help_heading = "Dictionary",
        help = "Suffixes added to every non-directory entry (comma-separated)."
    )]
    pub suffixes: Option<String>,

    #[arg(
        short = 't',
        long = "th",
        visible_alias = "threads",
        value_name = "N",
        help_heading = "Performance",
        help = "Number of worker threads."
    )]
    pub threads: Option<usize>,

    #[arg(
        long = "mr",
        visible_alias = "max-retries",
        value_name = "N",
        help_heading = "Performance",
        help = "Retries per path on transient network errors."
    )]
    pub max_retries: Option<u32>,

    #[arg(
        long = "to",
        visible_alias = "timeout",
        value_name = "SECS",
        help_heading = "Performance",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<f64>,

    #[arg(
        short = 'd',
        long = "dl",
        visible_alias = "delay",
        value_name = "SECS",
        help_heading = "Performance",
        help = "Delay before every request, per worker, in seconds."
    )]
    pub delay: Option<f64>,

    #[arg(
        short = 'r',
        long = "rt",
        visible_alias = "rate",
        value_name = "RPS",
        help_heading = "Performance",
        help = "Global request rate limit (requests per second)."
    )]
    pub rate: Option<u32>,

    #[arg(
        long = "mt",
        visible_alias = "max-time",
        value_name = "SECS",
        help_heading = "Performance",
        help = "Stop the run after this many seconds."
    )]
    pub max_time: Option<u64>,

    #[arg(
        short = 'm',
        long = "mth",
        visible_alias = "method",
        value_name = "METHOD",
        help_heading = "HTTP",
        help = "HTTP method (default GET)."
    )]
    pub method: Option<String>,

    #[arg(
        short = 'H',
        long = "hdr",
        visible_alias = "header",
        value_name = "HEADER",
        action = ArgAction::Append,
        help_heading = "HTTP",
        help = "Add a header to all requests (format: 'Key: Value', repeatable)."
    )]
    pub header: Vec<String>,

    #[arg(
        long = "ua",
        visible_alias = "user-agent",
        value_name = "UA",
        help_heading = "HTTP",
        help = "User-Agent header value."
    )]
    pub user_agent: Option<String>,

    #[arg(
        short = 'p',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'F',
        long = "fr",
        visible_alias = "follow-redirects",
        help_heading = "HTTP",
        help = "Follow redirects instead of reporting them."
    )]
    pub follow_redirects: bool,

    #[arg(
        short = 'x',
        long = "xse",
        visible_alias = "exclude-server-errors",
        help_heading = "Filters",
        help = "Do not report 5xx responses."
    )]
    pub exclude_server_errors: bool,

    #[arg(
        long = "xs",
        visible_alias = "exclude-status",
        value_name = "CODES",
        help_heading = "Filters",
        help = "Never report these status codes (comma-separated)."
    )]
    pub exclude_status: Option<String>,

    #[arg(
        long = "bl",
        visible_alias = "blacklist-dir",
        value_name = "DIR",
        help_heading = "Filters",
        help = "Directory of <status>_blacklist.txt files with paths to suppress."
    )]
    pub blacklist_dir: Option<String>,
}

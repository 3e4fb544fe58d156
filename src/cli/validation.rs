use crate::cli::args::CliArgs;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(threads) = args.threads {
        if threads == 0 {
            return Err("invalid threads, expected positive integer".to_string());
        }
    }
    if let Some(timeout) = args.timeout {
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err("invalid timeout, expected a positive number of seconds".to_string());
        }
    }
    if let Some(delay) = args.delay {
        if !delay.is_finite() || delay < 0.0 {
            return Err("invalid delay, expected zero or more seconds".to_string());
        }
    }
    if args.rate == Some(0) {
        return Err("invalid rate, expected positive integer".to_string());
    }
    if args.max_time == Some(0) {
        return Err("invalid max-time, expected positive integer".to_string());
    }
    if let Some(raw) = args.extensions.as_deref() {
        crate::utils::parse_extensions_csv(raw)
            .map_err(|e| format!("invalid --extensions '{raw}': {e}"))?;
    }
    if let Some(raw) = args.exclude_status.as_deref() {
        crate::utils::parse_u16_set_csv(raw)
            .map_err(|e| format!("invalid --exclude-status '{raw}': {e}"))?;
    }
    if let Some(raw) = args.method.as_deref() {
        crate::utils::parse_http_method(raw)
            .map_err(|e| format!("invalid --method '{raw}': {e}"))?;
    }
    for raw in &args.header {
        crate::utils::parse_header(raw).map_err(|e| format!("invalid --header '{raw}': {e}"))?;
    }
    if let Some(raw) = args.ip.as_deref() {
        raw.parse::<std::net::IpAddr>()
            .map_err(|_| format!("invalid --ip '{raw}', expected an IP address"))?;
    }
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --output-format '{raw}', expected plain, json or html"
            ));
        }
    }
    Ok(())
}

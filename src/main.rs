use oxycheck::config::app_config::{AppConfig, CheckerConfig, OutputFormat, load_config};
use oxycheck::{HttpCheck, Verdict};
use tracing_subscriber::EnvFilter;

fn to_fixed_width(input: &str, width: usize) -> String {
    use unicode_truncate::UnicodeTruncateStr;

    let (truncated, _) = input.unicode_truncate(width);
    format!("{:<width$}", truncated, width = width)
}

fn print_verdict(verdict: &Verdict, width: usize) {
    let name = to_fixed_width(verdict.title(), width);
    let icon = if verdict.is_healthy() {
        "✅"
    } else if verdict.is_degraded() {
        "⚠️"
    } else {
        "❌"
    };
    println!(
        "[{name}] {icon} URL: {}, Status: {}, Attempts: {}, Median: {:.2}ms",
        verdict.endpoint(),
        verdict.health(),
        verdict.attempts().len(),
        verdict.stats().median.as_secs_f64() * 1000.0,
    );
    if let Some(notice) = verdict.notice() {
        println!("[{name}]    {notice}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let AppConfig {
        checkers,
        output,
        max_name_width,
    } = load_config()?;

    // Validate everything up front so a bad entry aborts before any probing.
    let checks = checkers
        .into_iter()
        .map(|checker| match checker {
            CheckerConfig::Http(config) => HttpCheck::new(config),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut handles = vec![];
    for check in checks {
        handles.push(tokio::spawn(async move { check.run().await }));
    }

    let mut verdicts = Vec::with_capacity(handles.len());
    for handle in handles {
        verdicts.push(handle.await??);
    }

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&verdicts)?),
        OutputFormat::Text => {
            for verdict in &verdicts {
                print_verdict(verdict, max_name_width);
            }
        }
    }

    Ok(())
}

use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use acltool::cli::{parse_args, usage_text, CliAction};
use acltool::config::{Config, OutputFormat};
use acltool::{report, AclError, Orchestrator};

fn main() -> anyhow::Result<()> {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // Logs go to stderr so stdout carries only the report
    let filter = EnvFilter::try_new(&config.log_filter).or_else(|_| EnvFilter::try_new("warn"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = std::env::args().collect();
    let program = if args.is_empty() { "acltool".to_string() } else { args.remove(0) };

    let invocation = match parse_args(&args) {
        Ok(CliAction::Run(inv)) => inv,
        Ok(CliAction::Help) => {
            eprintln!("{}", usage_text(&program));
            std::process::exit(1);
        }
        Err(e) => {
            match config.output {
                OutputFormat::Text => {
                    eprintln!("{}", e.message());
                    eprintln!("{}", usage_text(&program));
                }
                OutputFormat::Json => fail(config.output, &e),
            }
            std::process::exit(e.exit_status());
        }
    };
    debug!(target: "acltool", ?invocation, output = ?config.output, namespace = %config.event_namespace, "starting");

    let result = acltool::platform::native().and_then(|platform| {
        Orchestrator::new(platform.as_ref())
            .with_event_namespace(config.event_namespace.clone())
            .run(&invocation)
    });

    match result {
        Ok(outcome) => {
            println!("{}", report::render_outcome(config.output, &outcome));
            Ok(())
        }
        Err(e) => {
            fail(config.output, &e);
            std::process::exit(e.exit_status());
        }
    }
}

fn fail(output: OutputFormat, err: &AclError) {
    match output {
        OutputFormat::Text => eprintln!("{}", report::render_error(output, err)),
        OutputFormat::Json => println!("{}", report::render_error(output, err)),
    }
}

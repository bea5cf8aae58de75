//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Print a group of checks under a heading and collect them.
fn section(title: &str, group: Vec<CheckResult>, checks: &mut Vec<CheckResult>) {
    println!("{}", style(title).bold());
    for check in &group {
        check.print();
    }
    println!();
    checks.extend(group);
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: Option<&str>) -> anyhow::Result<()> {
    let config_path = config_path
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);

    Output::header("Storyline Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    section(
        "External Tools",
        vec![
            check_tool(&settings.audio.ffmpeg_path, "-version", install_hint_ffmpeg(), false),
            check_launcher(settings),
        ],
        &mut checks,
    );

    section(
        "Credentials",
        vec![
            check_secret(
                "Gateway API key",
                settings.llm.api_key.as_deref(),
                true,
                "Set with: export GATEWAY_API_KEY='...' (required for every run)",
            ),
            check_secret(
                "Speech API key",
                settings.speech.api_key.as_deref(),
                false,
                "Set with: export CARTESIA_API_KEY='...' (needed for --with-audio)",
            ),
            check_storage(settings),
            check_secret(
                "Sandbox token",
                settings.remote.token.as_deref(),
                false,
                "Set with: export SPRITES_TOKEN='...' (needed for remote runs)",
            ),
        ],
        &mut checks,
    );

    section("Directories", vec![check_output_dir(settings)], &mut checks);
    section("Configuration", vec![check_config_file(&config_path)], &mut checks);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Storyline.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Storyline is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available. Missing optional tools are warnings.
fn check_tool(name: &str, version_arg: &str, hint: &str, optional: bool) -> CheckResult {
    let fail = |message: &str| {
        if optional {
            CheckResult::warning(name, message, hint)
        } else {
            CheckResult::error(name, message, hint)
        }
    };

    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            let version_display = if version.chars().count() > 50 {
                format!("{}...", version.chars().take(50).collect::<String>())
            } else {
                version
            };

            CheckResult::ok(name, &version_display)
        }
        Ok(_) => fail("installed but not working"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => fail("not found"),
        Err(e) => fail(&format!("error: {}", e)),
    }
}

fn check_launcher(settings: &Settings) -> CheckResult {
    match settings.remote.launcher.first() {
        Some(program) => check_tool(
            program,
            "--version",
            "Only needed for remote runs; set remote.launcher in the config file",
            true,
        ),
        None => CheckResult::warning(
            "Remote launcher",
            "not configured",
            "Set remote.launcher in the config file",
        ),
    }
}

/// Mask a secret, keeping a short prefix and suffix.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn check_secret(name: &str, value: Option<&str>, required: bool, hint: &str) -> CheckResult {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(key) => CheckResult::ok(name, &format!("configured ({})", mask(key))),
        None if required => CheckResult::error(name, "not set", hint),
        None => CheckResult::warning(name, "not set", hint),
    }
}

fn check_storage(settings: &Settings) -> CheckResult {
    let storage = &settings.storage;
    let mut missing = Vec::new();
    if storage.region.trim().is_empty() {
        missing.push("BUNNY_STORAGE_REGION");
    }
    if storage.zone.trim().is_empty() {
        missing.push("BUNNY_STORAGE_ZONE");
    }
    if storage.access_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
        missing.push("BUNNY_STORAGE_ACCESS_KEY");
    }

    if missing.is_empty() {
        CheckResult::ok(
            "Object storage",
            &format!("{} / {} (prefix {})", storage.region, storage.zone, storage.prefix),
        )
    } else {
        CheckResult::warning(
            "Object storage",
            &format!("missing {}", missing.join(", ")),
            "Needed for --with-audio uploads",
        )
    }
}

fn check_output_dir(settings: &Settings) -> CheckResult {
    let output_dir = settings.output_dir();
    if output_dir.exists() {
        let runs = std::fs::read_dir(&output_dir).map(|d| d.count()).unwrap_or(0);
        CheckResult::ok(
            "Output directory",
            &format!("{} ({} run(s))", output_dir.display(), runs),
        )
    } else {
        CheckResult::warning(
            "Output directory",
            &format!("{} (will be created)", output_dir.display()),
            "Directory will be created on the first run",
        )
    }
}

/// Check if the config file in use exists.
fn check_config_file(config_path: &std::path::Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: storyline config init",
        )
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg (needed for --with-audio)"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (needed for --with-audio)"
    } else {
        "Install from: https://ffmpeg.org/download.html (needed for --with-audio)"
    }
}

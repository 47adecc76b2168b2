//! Generate config command

use std::io::{self, BufRead, Write};
use std::path::Path;

use colored::Colorize;

use crate::config::StaticConfig;

/// Write a config file holding every default.
pub fn config_generate(output_path: Option<String>, force: bool) -> i32 {
    let path = output_path.unwrap_or_else(|| "config.example.toml".to_string());

    // "-" 表示输出到标准输出
    if path == "-" {
        print!("{}", StaticConfig::generate_sample_config());
        return 0;
    }

    // 文件已存在时，非 --force 模式下交互确认
    if !force && Path::new(&path).exists() {
        print!(
            "{} {} {}",
            "File already exists:".yellow(),
            path.blue(),
            "Overwrite? [y/N] ".yellow()
        );
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().lock().read_line(&mut input).is_err()
            || !input.trim().eq_ignore_ascii_case("y")
        {
            println!("{}", "Aborted.".red());
            return 0;
        }
    }

    match StaticConfig::default().save_to_file(&path) {
        Ok(()) => {
            println!(
                "  {} {}",
                "Configuration file generated successfully".green(),
                path.blue()
            );
            println!(
                "  {}",
                "Environment variables (IPR__SECTION__KEY) override file values".dimmed()
            );
            0
        }
        Err(e) => {
            println!(
                "  {} {}",
                "Failed to generate configuration file".red(),
                e.to_string().red()
            );
            1
        }
    }
}

//! Build script for uthread-runtime
//!
//! Handles configuration merging:
//! 1. Start with library defaults
//! 2. If UTH_CONFIG_RS env var is set, parse the user's config file
//! 3. Merge user values over defaults (user wins)
//! 4. Generate OUT_DIR/uth_merged_config.rs
//!
//! The user file only needs the values it wants to change.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration parameter definition
struct ConfigParam {
    name: &'static str,
    rust_type: &'static str,
    default_value: &'static str,
}

/// All configuration parameters with their defaults
const CONFIG_PARAMS: &[ConfigParam] = &[
    ConfigParam {
        name: "POLICY",
        rust_type: "&str",
        default_value: "\"default\"",
    },
    ConfigParam {
        name: "QUANTUM",
        rust_type: "i64",
        default_value: "2",
    },
    ConfigParam {
        name: "STACK_SIZE",
        rust_type: "usize",
        default_value: "256 * 1024",
    },
    ConfigParam {
        name: "HANDLER_STACK_SIZE",
        rust_type: "usize",
        default_value: "64 * 1024",
    },
    ConfigParam {
        name: "MAX_THREADS",
        rust_type: "usize",
        default_value: "1024",
    },
    ConfigParam {
        name: "MISS_ACTION",
        rust_type: "&str",
        default_value: "\"stop\"",
    },
    ConfigParam {
        name: "DEBUG_LOGGING",
        rust_type: "bool",
        default_value: "false",
    },
];

fn main() {
    let Ok(out_dir) = env::var("OUT_DIR") else {
        panic!("OUT_DIR not set");
    };
    let dest_path = Path::new(&out_dir).join("uth_merged_config.rs");

    let mut config: HashMap<&str, String> = CONFIG_PARAMS
        .iter()
        .map(|p| (p.name, p.default_value.to_string()))
        .collect();

    let user_path = env::var("UTH_CONFIG_RS").ok();
    if let Some(path) = &user_path {
        println!("cargo:rerun-if-changed={}", path);

        match fs::read_to_string(path) {
            Ok(content) => {
                parse_and_merge(&content, &mut config);
                println!("cargo:warning=Using custom config: {}", path);
            }
            Err(e) => {
                println!("cargo:warning=Failed to read UTH_CONFIG_RS ({}): {}", path, e);
            }
        }
    }

    println!("cargo:rerun-if-env-changed=UTH_CONFIG_RS");

    let output = generate_config(&config, user_path.is_some());
    if let Err(e) = fs::write(&dest_path, output) {
        panic!("failed to write {}: {}", dest_path.display(), e);
    }
}

/// Parse the user's config file and merge known values into `config`
fn parse_and_merge(content: &str, config: &mut HashMap<&str, String>) {
    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with("//") || !line.starts_with("pub const ") {
            continue;
        }

        let Some((name, value)) = parse_const_line(line) else {
            continue;
        };

        match CONFIG_PARAMS.iter().find(|p| p.name == name) {
            Some(param) => {
                config.insert(param.name, value);
            }
            None => println!("cargo:warning=Unknown config parameter: {}", name),
        }
    }
}

/// Parse `pub const NAME: TYPE = VALUE;` into (NAME, VALUE)
fn parse_const_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("pub const ")?.trim();

    let colon_pos = rest.find(':')?;
    let name = rest[..colon_pos].trim().to_string();

    let eq_pos = rest.find('=')?;
    let semi_pos = rest.rfind(';').unwrap_or(rest.len());
    if semi_pos <= eq_pos {
        return None;
    }
    let value = rest[eq_pos + 1..semi_pos].trim().to_string();

    Some((name, value))
}

fn generate_config(config: &HashMap<&str, String>, from_user: bool) -> String {
    let mut output = String::new();

    output.push_str("// Auto-generated by build.rs - do not edit\n");
    output.push_str("// Configuration merged from library defaults");
    if from_user {
        output.push_str(" and the user's UTH_CONFIG_RS file");
    }
    output.push_str("\n\n");

    for param in CONFIG_PARAMS {
        let value = config.get(param.name).map_or(param.default_value, |v| v.as_str());
        output.push_str(&format!("pub const {}: {} = {};\n", param.name, param.rust_type, value));
    }

    output
}

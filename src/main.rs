// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! couponlm CLI entry point.
//!
//! ## CLI Subcommands
//!
//! - `couponlm-cli tokenize <text>` - Show token ids for text
//! - `couponlm-cli sample-demo` - Show the sampling pipeline on fixed logits
//! - `couponlm-cli load <descriptor>` - Fetch and load a model
//! - `couponlm-cli chat <descriptor> <prompt>` - Stream a completion
//! - `couponlm-cli rank <descriptor> <coupons.json> <cart_total>` - Rank coupons
//! - `couponlm-cli config [show|defaults|validate]` - Inspect configuration

use std::process::ExitCode;

use couponlm_core::cli::{chat_cmd, config_cmd, demo_cmd, models_cmd, rank_cmd, EXIT_USAGE};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    let code = match command {
        "tokenize" => match args.get(2..).filter(|rest| !rest.is_empty()) {
            Some(rest) => demo_cmd::run_tokenize(&rest.join(" ")),
            None => usage_error("tokenize"),
        },
        "sample-demo" => demo_cmd::run_sample_demo(),
        "load" => match args.get(2) {
            Some(descriptor) => models_cmd::run_load(descriptor).await,
            None => usage_error("load"),
        },
        "chat" => match (args.get(2), args.get(3..).filter(|rest| !rest.is_empty())) {
            (Some(descriptor), Some(prompt)) => {
                chat_cmd::run_chat(descriptor, &prompt.join(" ")).await
            }
            _ => usage_error("chat"),
        },
        "rank" => match (args.get(2), args.get(3), args.get(4)) {
            (Some(descriptor), Some(coupons), Some(total)) => {
                rank_cmd::run_rank(descriptor, coupons, total).await
            }
            _ => usage_error("rank"),
        },
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => config_cmd::run_show(args.get(3).map(|s| s.as_str()) == Some("--json")),
                "defaults" => {
                    config_cmd::run_defaults();
                    0
                }
                "validate" => config_cmd::run_validate(),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    usage_error("config")
                }
            }
        }
        "help" | "--help" | "-h" => {
            match args.get(2) {
                Some(subcommand) => print_command_help(subcommand),
                None => print_usage(),
            }
            0
        }
        "version" | "--version" | "-V" => {
            println!("couponlm {}", env!("CARGO_PKG_VERSION"));
            0
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            1
        }
    };

    ExitCode::from(code.clamp(0, 255) as u8)
}

fn usage_error(command: &str) -> i32 {
    print_command_help(command);
    EXIT_USAGE
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "couponlm - on-device chat and coupon ranking runtime v{}

USAGE:
    couponlm-cli [COMMAND] [ARGS]

COMMANDS:
    tokenize     Show token ids for a piece of text
    sample-demo  Show temperature/top-k/top-p filtering on fixed logits
    load         Fetch and load a model descriptor
    chat         Stream a chat completion from a model
    rank         Rank coupons for a cart total
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

ENVIRONMENT:
    COUPONLM_CONFIG       TOML config file
    COUPONLM_LOG_LEVEL    Log filter (debug, info, warn, error)
    COUPONLM_LOG_FORMAT   json or pretty
    COUPONLM_SEED         Fixed sampler seed

EXIT CODES:
    0  Success
    1  Failure
    2  Usage or configuration error
",
        version
    );
}

fn print_command_help(command: &str) {
    match command {
        "tokenize" => eprintln!(
            "couponlm-cli tokenize - Show token ids

USAGE:
    couponlm-cli tokenize <TEXT>...

EXAMPLES:
    couponlm-cli tokenize \"save 20% on shoes\"
"
        ),
        "load" => eprintln!(
            "couponlm-cli load - Fetch and load a model

USAGE:
    couponlm-cli load <DESCRIPTOR>

DESCRIPTION:
    DESCRIPTOR is a JSON or TOML file with name, path, format, size,
    quantization, provider and sha256 fields. Progress goes to stderr.
"
        ),
        "chat" => eprintln!(
            "couponlm-cli chat - Stream a chat completion

USAGE:
    couponlm-cli chat <DESCRIPTOR> <PROMPT>...

DESCRIPTION:
    Loads the model, then streams the reply to stdout using the configured
    generation defaults (COUPONLM_MAX_TOKENS, COUPONLM_TEMPERATURE, ...).
"
        ),
        "rank" => eprintln!(
            "couponlm-cli rank - Rank coupons

USAGE:
    couponlm-cli rank <DESCRIPTOR> <COUPONS.json> <CART_TOTAL>

DESCRIPTION:
    Prints the coupons as JSON with score and confidence, highest score
    first. Falls back to input order if the ranking model is unavailable.
"
        ),
        "config" => eprintln!(
            "couponlm-cli config - Inspect configuration

USAGE:
    couponlm-cli config show [--json]
    couponlm-cli config defaults
    couponlm-cli config validate
"
        ),
        _ => print_usage(),
    }
}

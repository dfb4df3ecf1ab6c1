// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chat CLI subcommand: stream one completion to stdout.

use std::io::Write;

use super::{progress_printer, read_descriptor, runtime_from_env, EXIT_USAGE};
use crate::engine::{ChatMessage, TextStream};

/// Run `chat <descriptor> <prompt>`.
///
/// Returns exit code: 0 on success, 1 on load or generation failure.
pub async fn run_chat(descriptor_path: &str, prompt: &str) -> i32 {
    let descriptor = match read_descriptor(descriptor_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_USAGE;
        }
    };
    let runtime = match runtime_from_env() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_USAGE;
        }
    };

    if let Err(e) = runtime
        .load_model(&descriptor, Some(progress_printer(&descriptor.name)))
        .await
    {
        eprintln!("Failed to load '{}': {}", descriptor.name, e);
        return 1;
    }
    let mut generation = match runtime.generation_loop(&descriptor.name) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let (sender, mut stream) = TextStream::new();
    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = stream.next().await {
            if let crate::engine::StreamEvent::Fragment(text) = event {
                let _ = write!(stdout, "{}", text);
                let _ = stdout.flush();
            }
        }
        let _ = writeln!(stdout);
    });

    let messages = [ChatMessage::user(prompt)];
    let config = runtime.config().generation.clone();
    let result = generation.generate_streaming(&messages, &config, sender).await;
    let _ = printer.await;
    runtime.shutdown();

    match result {
        Ok(output) => {
            eprintln!(
                "[{} tokens, finish: {}]",
                output.tokens_generated,
                output.finish_reason.as_str()
            );
            0
        }
        Err(e) => {
            eprintln!("Generation failed: {}", e);
            1
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pulls generated source out of an LLM reply.
//!
//! A fence is any line whose left-trimmed text starts with three backticks,
//! optionally followed by a language tag. Only the first fenced block is
//! used; later blocks are ignored. A reply without fences is returned as-is.

const FENCE: &str = "```";

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with(FENCE)
}

/// Interior of the first fenced block, trimmed, or `content` unchanged when
/// there is none. An unterminated block runs to the end of the input.
pub fn extract_code(content: &str) -> String {
    let mut inside = false;
    let mut block: Vec<&str> = Vec::new();

    for line in content.split('\n') {
        if is_fence(line) {
            if inside {
                return block.join("\n").trim().to_string();
            }
            inside = true;
            continue;
        }
        if inside {
            block.push(line);
        }
    }

    if inside {
        block.join("\n").trim().to_string()
    } else {
        content.to_string()
    }
}

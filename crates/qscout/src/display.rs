//! Console display: status and answers on stdout.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use qscout_core::{domain::AnswerEntry, ports::DisplayPort, Result};

pub struct ConsoleDisplay {
    controls_enabled: AtomicBool,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self {
            controls_enabled: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl DisplayPort for ConsoleDisplay {
    async fn set_status(&self, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }

    async fn show_answer(&self, entry: &AnswerEntry) -> Result<()> {
        match entry {
            AnswerEntry::Single(text) => println!("  {text}"),
            AnswerEntry::Multiple(values) => {
                for value in values {
                    println!("  • {value}");
                }
            }
        }
        Ok(())
    }

    async fn show_no_answer(&self) -> Result<()> {
        println!("❓ No answer found");
        Ok(())
    }

    async fn set_controls_enabled(&self, enabled: bool) -> Result<()> {
        self.controls_enabled.store(enabled, Ordering::SeqCst);
        tracing::debug!(enabled, "manual entry controls");
        Ok(())
    }
}

//! Command helpers and mode-scoped blocks.
//!
//! Blocks are async closures that receive the session explicitly:
//!
//! ```rust,no_run
//! # async fn example(session: &mut netops::Session) -> Result<(), netops::Error> {
//! session
//!     .interface("GigabitEthernet1/0/1", async |s| {
//!         s.set("description", "uplink").await?;
//!         s.disable("shutdown").await?;
//!         Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use regex::Regex;

use super::Session;
use crate::channel::ANY_OUTPUT;
use crate::error::Result;
use crate::mode::Mode;
use crate::parser::{MatchRecord, ParseOutput};

const INTERFACE_STATUS: &str = "interfaces status";

impl Session {
    /// `show <item>`.
    pub async fn get(&mut self, item: &str) -> Result<String> {
        self.run(&format!("show {}", item)).await
    }

    /// `show <item>`, parsed through the session's parser tree.
    pub async fn get_parsed(&mut self, item: &str) -> Result<ParseOutput> {
        let command = format!("show {}", item);
        let output = self.run(&command).await?;
        Ok(self.parser.parse(&command, &output))
    }

    /// `<item> <value>`.
    pub async fn set(&mut self, item: &str, value: &str) -> Result<String> {
        self.run(&format!("{} {}", item, value)).await
    }

    /// `<item>`.
    pub async fn enable(&mut self, item: &str) -> Result<String> {
        self.run(item).await
    }

    /// `no <item>`.
    pub async fn disable(&mut self, item: &str) -> Result<String> {
        self.run(&format!("no {}", item)).await
    }

    /// `<item> generate <options>`, e.g. `crypto key generate rsa modulus 2048`.
    pub async fn generate(&mut self, item: &str, options: &str) -> Result<String> {
        self.run(&format!("{} generate {}", item, options)).await
    }

    /// `<item> zeroize`, confirming the prompt that follows with `yes`.
    pub async fn zeroize(&mut self, item: &str) -> Result<String> {
        self.log
            .debug(format_args!("({}) Executing {} zeroize", self.mode, item));
        self.dispatch(&format!("{} zeroize", item), Some(&*ANY_OUTPUT))
            .await?;
        self.dispatch("yes", None).await
    }

    /// Run a command in privileged mode.
    pub async fn exec(&mut self, command: &str) -> Result<String> {
        self.ensure_mode(Mode::Privileged).await?;
        self.run(command).await
    }

    /// Run a command in configuration mode.
    pub async fn config(&mut self, command: &str) -> Result<String> {
        self.ensure_mode(Mode::Configuration).await?;
        self.run(command).await
    }

    /// Save the running configuration (`write memory`).
    pub async fn write(&mut self) -> Result<String> {
        self.exec("write memory").await
    }

    /// Run `block` in privileged mode.
    pub async fn privileged<T, F>(&mut self, block: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Session) -> Result<T>,
    {
        self.ensure_mode(Mode::Privileged).await?;
        block(self).await
    }

    /// Run `block` in configuration mode.
    pub async fn configuration<T, F>(&mut self, block: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Session) -> Result<T>,
    {
        self.ensure_mode(Mode::Configuration).await?;
        block(self).await
    }

    /// Run `block` in configuration mode, then save the configuration.
    ///
    /// Nothing is saved if the block fails.
    pub async fn configuration_and_save<T, F>(&mut self, block: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Session) -> Result<T>,
    {
        let value = self.configuration(block).await?;
        self.write().await?;
        Ok(value)
    }

    /// Enter `interface <name>` and run `block` there.
    ///
    /// The session is left in the interface sub-mode; no `exit` is sent.
    pub async fn interface<T, F>(&mut self, name: &str, block: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Session) -> Result<T>,
    {
        self.enter_interface(name).await?;
        block(self).await
    }

    /// Run `block` in every interface whose name matches `pattern`.
    ///
    /// Interfaces come from `show interfaces status`, named by joining the
    /// record's `short_type` and `port_number` (e.g. `Gi1/0/1`). The block
    /// also receives the record. Returns the names visited, in output order.
    pub async fn interfaces<F>(&mut self, pattern: &Regex, mut block: F) -> Result<Vec<String>>
    where
        F: AsyncFnMut(&mut Session, &MatchRecord) -> Result<()>,
    {
        self.ensure_mode(Mode::Privileged).await?;
        let selected: Vec<(String, MatchRecord)> = self
            .get_parsed(INTERFACE_STATUS)
            .await?
            .into_records()
            .into_iter()
            .filter_map(|record| Some((interface_name(&record)?, record)))
            .filter(|(name, _)| pattern.is_match(name))
            .collect();

        let mut visited = Vec::with_capacity(selected.len());
        for (name, record) in selected {
            self.enter_interface(&name).await?;
            block(&mut *self, &record).await?;
            visited.push(name);
        }
        Ok(visited)
    }

    /// Enter `line <lines>` (e.g. `vty 0 15`) and run `block` there. Like
    /// [`interface`](Self::interface) it stays in the sub-mode afterwards.
    pub async fn lines<T, F>(&mut self, lines: &str, block: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Session) -> Result<T>,
    {
        self.ensure_mode(Mode::Configuration).await?;
        self.run(&format!("line {}", lines)).await?;
        block(self).await
    }

    async fn enter_interface(&mut self, name: &str) -> Result<String> {
        self.ensure_mode(Mode::Configuration).await?;
        self.run(&format!("interface {}", name)).await
    }
}

/// `short_type` + `port_number`, if the record has both.
fn interface_name(record: &MatchRecord) -> Option<String> {
    Some(format!(
        "{}{}",
        record.get("short_type")?,
        record.get("port_number")?
    ))
}

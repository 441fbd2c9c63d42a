//! Crontab management for unattended re-runs on an always-on host.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::permissions::Role;

/// One scheduled invocation of the share pipeline.
#[derive(Debug, Clone)]
pub struct CronJob {
    pub folder: PathBuf,
    pub email: String,
    pub role: Role,
    pub interval_minutes: u32,
    /// Directory the job runs from (where credentials.json lives).
    pub workdir: PathBuf,
    /// Absolute path of the gdshare binary.
    pub binary: PathBuf,
    pub log_path: PathBuf,
}

impl CronJob {
    pub fn schedule(&self) -> String {
        if self.interval_minutes <= 1 {
            "* * * * *".to_owned()
        } else {
            format!("*/{} * * * *", self.interval_minutes)
        }
    }

    /// The crontab line for this job, with output appended to the log
    /// file for external rotation.
    pub fn entry(&self) -> String {
        format!(
            "{} cd {} && {} --folder {} --email {} --role {} >> {} 2>&1",
            self.schedule(),
            self.workdir.display(),
            self.binary.display(),
            self.folder.display(),
            self.email,
            self.role,
            self.log_path.display(),
        )
    }

    /// Loose match used by removal: same folder, same email, same binary.
    /// Interval and role changes still match, so reinstalling with new
    /// settings starts with a clean slate.
    pub fn matches(&self, line: &str) -> bool {
        line.contains(&self.folder.display().to_string())
            && line.contains(&self.email)
            && line.contains(&self.binary.display().to_string())
    }
}

fn append_entry(table: &str, entry: &str) -> String {
    let table = table.trim_end();
    if table.is_empty() {
        format!("{}\n", entry)
    } else {
        format!("{}\n{}\n", table, entry)
    }
}

fn filter_entries(table: &str, job: &CronJob) -> (String, usize) {
    let mut kept = vec![];
    let mut removed = 0;
    for line in table.lines() {
        if job.matches(line) {
            removed += 1;
        } else {
            kept.push(line);
        }
    }
    let mut table = kept.join("\n");
    if !table.is_empty() {
        table.push('\n');
    }
    (table, removed)
}

/// Reads the current user crontab. A missing table is an empty one.
pub fn current_table() -> Result<String> {
    let output = Command::new("crontab")
        .arg("-l")
        .output()
        .map_err(|e| Error::Scheduler(format!("cannot run crontab: {}", e)))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Ok(String::new())
    }
}

fn load_table(table: &str) -> Result<()> {
    let mut child = Command::new("crontab")
        .arg("-")
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Scheduler(format!("cannot run crontab: {}", e)))?;

    child
        .stdin
        .take()
        .ok_or_else(|| Error::Scheduler("crontab stdin unavailable".to_owned()))?
        .write_all(table.as_bytes())
        .map_err(|e| Error::Scheduler(format!("cannot write crontab: {}", e)))?;

    let status = child
        .wait()
        .map_err(|e| Error::Scheduler(format!("cannot run crontab: {}", e)))?;
    if !status.success() {
        return Err(Error::Scheduler(format!("crontab exited with {}", status)));
    }
    Ok(())
}

fn clear_table() -> Result<()> {
    let status = Command::new("crontab")
        .arg("-r")
        .status()
        .map_err(|e| Error::Scheduler(format!("cannot run crontab: {}", e)))?;
    if !status.success() {
        return Err(Error::Scheduler(format!("crontab exited with {}", status)));
    }
    Ok(())
}

/// Installs the job. Returns false when the exact entry is already
/// present; a changed entry is appended alongside any old one, so run
/// `remove` first when changing arguments.
pub fn install(job: &CronJob) -> Result<bool> {
    let table = current_table()?;
    let entry = job.entry();
    if table.lines().any(|line| line == entry) {
        return Ok(false);
    }
    load_table(&append_entry(&table, &entry))?;
    Ok(true)
}

/// Removes every entry matching the job. Returns how many were dropped.
pub fn remove(job: &CronJob) -> Result<usize> {
    let table = current_table()?;
    let (filtered, removed) = filter_entries(&table, job);
    if removed == 0 {
        return Ok(0);
    }
    if filtered.trim().is_empty() {
        clear_table()?;
    } else {
        load_table(&filtered)?;
    }
    Ok(removed)
}

/// External rotation policy for the job log: daily, seven generations,
/// compressed.
pub fn logrotate_conf(log_path: &Path) -> String {
    format!(
        "{} {{\n    daily\n    rotate 7\n    compress\n    missingok\n    notifempty\n}}\n",
        log_path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> CronJob {
        CronJob {
            folder: PathBuf::from("/data/photos"),
            email: "user@example.com".to_owned(),
            role: Role::Writer,
            interval_minutes: 2,
            workdir: PathBuf::from("/opt/gdshare"),
            binary: PathBuf::from("/opt/gdshare/gdshare"),
            log_path: PathBuf::from("/opt/gdshare/cron.log"),
        }
    }

    #[test]
    fn schedule_test() {
        let mut j = job();
        assert_eq!(j.schedule(), "*/2 * * * *");
        j.interval_minutes = 1;
        assert_eq!(j.schedule(), "* * * * *");
        j.interval_minutes = 30;
        assert_eq!(j.schedule(), "*/30 * * * *");
    }

    #[test]
    fn entry_test() {
        let entry = job().entry();
        assert_eq!(
            entry,
            "*/2 * * * * cd /opt/gdshare && /opt/gdshare/gdshare \
             --folder /data/photos --email user@example.com --role writer \
             >> /opt/gdshare/cron.log 2>&1"
        );
    }

    #[test]
    fn append_entry_test() {
        assert_eq!(append_entry("", "A"), "A\n");
        assert_eq!(append_entry("X\n", "A"), "X\nA\n");
        assert_eq!(append_entry("X\nY", "A"), "X\nY\nA\n");
    }

    #[test]
    fn filter_entries_test() {
        let j = job();
        let other = "0 * * * * /usr/bin/backup";
        let table = format!("{}\n{}\n", other, j.entry());

        let (filtered, removed) = filter_entries(&table, &j);
        assert_eq!(removed, 1);
        assert_eq!(filtered, format!("{}\n", other));

        // a job with a different interval still matches
        let mut rescheduled = j.clone();
        rescheduled.interval_minutes = 10;
        let (_, removed) = filter_entries(&table, &rescheduled);
        assert_eq!(removed, 1);

        // different email does not
        let mut someone_else = j.clone();
        someone_else.email = "other@example.com".to_owned();
        let (kept, removed) = filter_entries(&table, &someone_else);
        assert_eq!(removed, 0);
        assert_eq!(kept, table);
    }

    #[test]
    fn filter_all_entries_test() {
        let j = job();
        let (filtered, removed) = filter_entries(&format!("{}\n", j.entry()), &j);
        assert_eq!(removed, 1);
        assert!(filtered.is_empty());
    }

    #[test]
    fn logrotate_conf_test() {
        let conf = logrotate_conf(Path::new("/opt/gdshare/cron.log"));
        assert!(conf.starts_with("/opt/gdshare/cron.log {"));
        assert!(conf.contains("daily"));
        assert!(conf.contains("rotate 7"));
        assert!(conf.contains("compress"));
    }
}

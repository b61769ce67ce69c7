use anyhow::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// stderr と logs/ 以下のファイルに同じ行を書き出すロガー
#[derive(Clone)]
pub struct LogFile {
    file: Option<Arc<Mutex<BufWriter<File>>>>,
}

impl LogFile {
    /// `<dir>/<prefix>_YYYYmmdd_HHMMSS.log` を作成
    pub fn open<P: AsRef<Path>>(dir: P, prefix: &str) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_{}.log", prefix, ts));
        let file = File::create(&path)?;
        eprintln!("Log: {}", path.display());
        Ok(Self {
            file: Some(Arc::new(Mutex::new(BufWriter::new(file)))),
        })
    }

    /// ファイルに書かない（テスト・ファイル作成失敗時）
    pub fn stderr_only() -> Self {
        Self { file: None }
    }

    pub fn write_line(&self, msg: &str) {
        eprintln!("{}", msg);
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let ts = chrono::Local::now().format("%H:%M:%S%.3f");
                let _ = writeln!(f, "{} {}", ts, msg);
                let _ = f.flush();
            }
        }
    }
}

/// `log!(logfile, "[tag] ...")`
#[macro_export]
macro_rules! log {
    ($logfile:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $logfile.write_line(&msg);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_to_file() {
        let dir = std::env::temp_dir().join(format!("kineticore_log_test_{}", std::process::id()));
        let logfile = LogFile::open(&dir, "test").unwrap();
        crate::log!(logfile, "[test] hello {}", 42);

        let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[test] hello 42"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_stderr_only() {
        let logfile = LogFile::stderr_only();
        crate::log!(logfile, "[test] no file");
    }
}

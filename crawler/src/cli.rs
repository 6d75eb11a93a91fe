use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "crawler", about = "Crawls the BitTorrent Mainline DHT for torrent metadata")]
pub struct Cli {
    /// Do not persist `.torrent` files; stdout/log only.
    #[arg(short = 's', long = "stdout-only")]
    pub stdout_only: bool,

    /// Magnet log path.
    #[arg(short = 'p', long = "magnet-log", default_value = "hash.log")]
    pub magnet_log: PathBuf,

    /// Concurrency cap for metadata workers.
    #[arg(short = 't', long = "concurrency", default_value_t = scheduler::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Enable/disable `.torrent` file persistence under the torrent directory.
    #[arg(short = 'b', long = "save-torrents", default_value_t = true)]
    pub save_torrents: bool,

    /// UDP bind address.
    #[arg(long = "bind", default_value = dht_crawler::DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Directory for bootstrap_nodes.jsonl / metadata_peers.jsonl.
    #[arg(long = "state-dir", default_value = "state")]
    pub state_dir: PathBuf,

    /// Directory for reconstructed `.torrent` files.
    #[arg(long = "torrent-dir", default_value = "BT")]
    pub torrent_dir: PathBuf,

    /// Raise log verbosity (repeatable).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Lower log verbosity (repeatable).
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        let base = 2i8 + self.verbose as i8 - self.quiet as i8;
        match base {
            i8::MIN..=0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            3 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cli = Cli::parse_from(["crawler"]);
        assert!(!cli.stdout_only);
        assert_eq!(cli.magnet_log, PathBuf::from("hash.log"));
        assert_eq!(cli.concurrency, scheduler::DEFAULT_CONCURRENCY);
        assert!(cli.save_torrents);
        assert_eq!(cli.state_dir, PathBuf::from("state"));
        assert_eq!(cli.torrent_dir, PathBuf::from("BT"));
        assert_eq!(cli.log_level(), log::LevelFilter::Info);
    }

    #[test]
    fn verbose_raises_level() {
        let cli = Cli::parse_from(["crawler", "-v", "-v"]);
        assert_eq!(cli.log_level(), log::LevelFilter::Trace);
    }

    #[test]
    fn quiet_lowers_level() {
        let cli = Cli::parse_from(["crawler", "-q", "-q"]);
        assert_eq!(cli.log_level(), log::LevelFilter::Error);
    }

    #[test]
    fn rejects_malformed_bind_address() {
        let result = Cli::try_parse_from(["crawler", "--bind", "not-an-address"]);
        assert!(result.is_err());
    }
}

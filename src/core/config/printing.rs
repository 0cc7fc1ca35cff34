use crate::core::config::data::Config;
use crate::core::config::defaults::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::utils::url::DEFAULT_BASE_URL;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: (unset, using {DEFAULT_BASE_URL})"),
        }
        match self.stream_timeout() {
            Some(limit) => println!("  stream-timeout: {}s", limit.as_secs()),
            None => println!("  stream-timeout: (no limit)"),
        }
        match self.request_timeout {
            Some(secs) => println!("  request-timeout: {secs}s"),
            None => println!("  request-timeout: (unset, using {DEFAULT_REQUEST_TIMEOUT_SECS}s)"),
        }
        match &self.username {
            Some(username) => println!("  username: {username}"),
            None => println!("  username: (unset)"),
        }
        match self.remember_me() {
            true => println!("  remember-me: on"),
            false => println!("  remember-me: off"),
        }
    }
}

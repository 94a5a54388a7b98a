pub const DEFAULT_SUBJECT: &str = "Zscaler Root CA";

pub const DEFAULT_CONNECTIVITY_URL: &str = "http://detectportal.firefox.com/success.txt";
pub const DEFAULT_CONNECTIVITY_TIMEOUT_MS: u64 = 3000;

pub const DEFAULT_JAVA_STOREPASS: &str = "changeit";

pub const LINUX_SYSTEM_BUNDLE: &str = "/etc/ssl/certs/ca-certificates.crt";
pub const MACOS_SYSTEM_KEYCHAIN: &str = "/Library/Keychains/System.keychain";
pub const MACOS_BASE_BUNDLE: &str = "/etc/ssl/cert.pem";

pub const WINDOWS_MACHINE_ENV_KEY: &str =
    r"HKLM\SYSTEM\CurrentControlSet\Control\Session Manager\Environment";

pub const EXIT_OK: u8 = 0;
pub const EXIT_ABORTED: u8 = 1;
pub const EXIT_PARTIAL: u8 = 2;

pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

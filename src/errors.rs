use std::fmt;

#[derive(Debug, Clone)]
pub enum IpResolverError {
    Network(String),
    ArchiveCorrupt(String),
    PayloadNotFound(String),
    Install(String),
    DatabaseUnavailable(String),
    LookupMiss(String),
    InvalidIp(String),
    LookupFailed(String),
    Config(String),
    FileOperation(String),
}

impl IpResolverError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            IpResolverError::Network(_) => "E001",
            IpResolverError::ArchiveCorrupt(_) => "E002",
            IpResolverError::PayloadNotFound(_) => "E003",
            IpResolverError::Install(_) => "E004",
            IpResolverError::DatabaseUnavailable(_) => "E005",
            IpResolverError::LookupMiss(_) => "E006",
            IpResolverError::InvalidIp(_) => "E007",
            IpResolverError::LookupFailed(_) => "E008",
            IpResolverError::Config(_) => "E009",
            IpResolverError::FileOperation(_) => "E010",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            IpResolverError::Network(_) => "Network Error",
            IpResolverError::ArchiveCorrupt(_) => "Archive Corrupt",
            IpResolverError::PayloadNotFound(_) => "Payload Not Found",
            IpResolverError::Install(_) => "Install Error",
            IpResolverError::DatabaseUnavailable(_) => "Database Unavailable",
            IpResolverError::LookupMiss(_) => "Lookup Miss",
            IpResolverError::InvalidIp(_) => "Invalid IP Address",
            IpResolverError::LookupFailed(_) => "Lookup Failed",
            IpResolverError::Config(_) => "Configuration Error",
            IpResolverError::FileOperation(_) => "File Operation Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            IpResolverError::Network(msg) => msg,
            IpResolverError::ArchiveCorrupt(msg) => msg,
            IpResolverError::PayloadNotFound(msg) => msg,
            IpResolverError::Install(msg) => msg,
            IpResolverError::DatabaseUnavailable(msg) => msg,
            IpResolverError::LookupMiss(msg) => msg,
            IpResolverError::InvalidIp(msg) => msg,
            IpResolverError::LookupFailed(msg) => msg,
            IpResolverError::Config(msg) => msg,
            IpResolverError::FileOperation(msg) => msg,
        }
    }

    /// Errors raised by one of the refresh pipeline stages.
    ///
    /// These never leave the refresh coordinator.
    pub fn is_refresh_stage(&self) -> bool {
        matches!(
            self,
            IpResolverError::Network(_)
                | IpResolverError::ArchiveCorrupt(_)
                | IpResolverError::PayloadNotFound(_)
                | IpResolverError::Install(_)
        )
    }

    /// A miss is an expected outcome, not an anomaly worth logging.
    pub fn is_benign(&self) -> bool {
        matches!(self, IpResolverError::LookupMiss(_))
    }

    /// 格式化为彩色输出（用于 serve 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for IpResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 默认使用简洁格式
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for IpResolverError {}

// 便捷的构造函数
impl IpResolverError {
    pub fn network<T: Into<String>>(msg: T) -> Self {
        IpResolverError::Network(msg.into())
    }

    pub fn archive_corrupt<T: Into<String>>(msg: T) -> Self {
        IpResolverError::ArchiveCorrupt(msg.into())
    }

    pub fn payload_not_found<T: Into<String>>(msg: T) -> Self {
        IpResolverError::PayloadNotFound(msg.into())
    }

    pub fn install<T: Into<String>>(msg: T) -> Self {
        IpResolverError::Install(msg.into())
    }

    pub fn database_unavailable<T: Into<String>>(msg: T) -> Self {
        IpResolverError::DatabaseUnavailable(msg.into())
    }

    pub fn lookup_miss<T: Into<String>>(msg: T) -> Self {
        IpResolverError::LookupMiss(msg.into())
    }

    pub fn invalid_ip<T: Into<String>>(msg: T) -> Self {
        IpResolverError::InvalidIp(msg.into())
    }

    pub fn lookup_failed<T: Into<String>>(msg: T) -> Self {
        IpResolverError::LookupFailed(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        IpResolverError::Config(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        IpResolverError::FileOperation(msg.into())
    }
}

impl From<std::io::Error> for IpResolverError {
    fn from(err: std::io::Error) -> Self {
        IpResolverError::FileOperation(err.to_string())
    }
}

impl From<maxminddb::MaxMindDbError> for IpResolverError {
    fn from(err: maxminddb::MaxMindDbError) -> Self {
        IpResolverError::LookupFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IpResolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_stage_classification() {
        assert!(IpResolverError::network("x").is_refresh_stage());
        assert!(IpResolverError::archive_corrupt("x").is_refresh_stage());
        assert!(IpResolverError::payload_not_found("x").is_refresh_stage());
        assert!(IpResolverError::install("x").is_refresh_stage());
        assert!(!IpResolverError::database_unavailable("x").is_refresh_stage());
        assert!(!IpResolverError::lookup_miss("x").is_refresh_stage());
    }

    #[test]
    fn test_only_miss_is_benign() {
        assert!(IpResolverError::lookup_miss("1.1.1.1").is_benign());
        assert!(!IpResolverError::invalid_ip("nope").is_benign());
        assert!(!IpResolverError::database_unavailable("none").is_benign());
    }
}

//! 总线错误类型
//!
//! 总线控制器、分发引擎与各磁盘后端共用同一个错误枚举，
//! 可通过 [`BusError::status_code()`] 转换为宿主侧的状态码。

use thiserror::Error;

/// 本 crate 统一使用的结果类型
pub type Result<T> = core::result::Result<T, BusError>;

/// 总线错误类型
///
/// 请求失败时以该错误完成请求，传输字节数为 0。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// 资源分配失败
    #[error("resource exhausted")]
    ResourceExhausted,

    /// 参数无效（单元号不存在、零长度 I/O、未知查询类型等）
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// 总线不存在、正在停止，或设备已删除
    #[error("no such device")]
    NoSuchDevice,

    /// 无法识别的控制码或查询类型
    #[error("operation not supported")]
    NotSupported,

    /// 重复挂接
    #[error("already exists")]
    AlreadyExists,

    /// 总线已经启动
    #[error("bus already started")]
    AlreadyStarted,

    /// 操作对目标不合法（例如卸载启动设备）
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// 请求被取消
    #[error("request cancelled")]
    Cancelled,

    /// 内部不变量被破坏
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// 后端 I/O 失败
    #[error("io error: {0}")]
    Io(String),
}

impl BusError {
    /// 转换为宿主侧状态码
    pub fn status_code(&self) -> u32 {
        match self {
            BusError::ResourceExhausted => 0xC000_009A,
            BusError::InvalidParameter(_) => 0xC000_000D,
            BusError::NoSuchDevice => 0xC000_000E,
            BusError::NotSupported => 0xC000_00BB,
            BusError::AlreadyExists => 0xC000_0035,
            BusError::AlreadyStarted => 0xC000_0025,
            BusError::InvalidOperation(_) => 0xC000_0010,
            BusError::Cancelled => 0xC000_0120,
            BusError::Internal(_) => 0xC000_00E5,
            BusError::Io(_) => 0xC000_0185,
        }
    }
}

impl From<std::io::Error> for BusError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::OutOfMemory => BusError::ResourceExhausted,
            std::io::ErrorKind::NotFound => BusError::NoSuchDevice,
            _ => BusError::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct() {
        let all = [
            BusError::ResourceExhausted,
            BusError::InvalidParameter("x"),
            BusError::NoSuchDevice,
            BusError::NotSupported,
            BusError::AlreadyExists,
            BusError::AlreadyStarted,
            BusError::InvalidOperation("x"),
            BusError::Cancelled,
            BusError::Internal("x"),
            BusError::Io(String::new()),
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.status_code(), b.status_code(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn io_error_mapping() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(BusError::from(missing), BusError::NoSuchDevice);

        let other = std::io::Error::other("boom");
        assert!(matches!(BusError::from(other), BusError::Io(msg) if msg.contains("boom")));
    }
}

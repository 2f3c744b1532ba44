//! 命令解析
//!
//! 把单个 token 解析为 [`Command`]。解析是纯函数（除了单值输入时的警告日志），
//! 任何输入都不会 panic。

use std::fmt;

use tracing::warn;

/// `primary,secondary` 分隔符
const SEPARATOR: char = ',';

/// 协议命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// 停止并关闭连接
    Stop,

    /// 执行一次戳动
    Move {
        /// 水平估计值（米）
        primary: f64,
        /// 深度命令（米），缺省为 0.0
        secondary: f64,
    },

    /// 格式错误或非数值的 token
    Rejected { reason: String },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Stop => write!(f, "Stop"),
            Command::Move { primary, secondary } => {
                write!(f, "Move({:.4}, {:.4})", primary, secondary)
            },
            Command::Rejected { reason } => write!(f, "Rejected({})", reason),
        }
    }
}

/// 解析单个 token
///
/// 返回 `None` 表示空 token（调用方跳过）。
///
/// # 规则
///
/// - `s` / `S` → [`Command::Stop`]
/// - `a,b` → 在第一个逗号处拆分，两部分都必须是数值，否则 `bad token`
/// - `a` → `Move { a, 0.0 }`，并记录深度被假定为 0 的警告；非数值则 `non-numeric token`
pub fn parse(token: &str) -> Option<Command> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if token.eq_ignore_ascii_case("s") {
        return Some(Command::Stop);
    }

    if let Some((primary, secondary)) = token.split_once(SEPARATOR) {
        let command = match (parse_number(primary), parse_number(secondary)) {
            (Some(primary), Some(secondary)) => Command::Move { primary, secondary },
            _ => Command::Rejected {
                reason: format!("bad token: {}", token),
            },
        };
        return Some(command);
    }

    let command = match parse_number(token) {
        Some(primary) => {
            warn!("Got single value {:.4}; assuming depth 0.0", primary);
            Command::Move {
                primary,
                secondary: 0.0,
            }
        },
        None => Command::Rejected {
            reason: format!("non-numeric token: {}", token),
        },
    };
    Some(command)
}

/// 解析十进制 / 科学计数法数值
///
/// 接受可选符号；拒绝 `nan`、`inf` 以及溢出为无穷大的值（如 `1e999`）。
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let looks_numeric = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'));
    if !looks_numeric {
        return None;
    }

    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(reason: &str) -> Option<Command> {
        Some(Command::Rejected {
            reason: reason.to_string(),
        })
    }

    #[test]
    fn test_stop_is_case_insensitive() {
        assert_eq!(parse("s"), Some(Command::Stop));
        assert_eq!(parse("S"), Some(Command::Stop));
        assert_eq!(parse(" s "), Some(Command::Stop));
        assert_eq!(parse("stop"), rejected("non-numeric token: stop"));
    }

    #[test]
    fn test_pair() {
        assert_eq!(
            parse("0.05,0.03"),
            Some(Command::Move {
                primary: 0.05,
                secondary: 0.03
            })
        );
        assert_eq!(
            parse("-1e-2,+2.5E1"),
            Some(Command::Move {
                primary: -0.01,
                secondary: 25.0
            })
        );
    }

    #[test]
    fn test_single_value_defaults_depth() {
        assert_eq!(
            parse("0.1"),
            Some(Command::Move {
                primary: 0.1,
                secondary: 0.0
            })
        );
        assert_eq!(
            parse(".5"),
            Some(Command::Move {
                primary: 0.5,
                secondary: 0.0
            })
        );
    }

    #[test]
    fn test_bad_pairs() {
        assert_eq!(parse("1,"), rejected("bad token: 1,"));
        assert_eq!(parse(",2"), rejected("bad token: ,2"));
        assert_eq!(parse("1,2,3"), rejected("bad token: 1,2,3"));
        assert_eq!(parse("a,1"), rejected("bad token: a,1"));
        assert_eq!(parse("1,nan"), rejected("bad token: 1,nan"));
    }

    #[test]
    fn test_non_numeric() {
        assert_eq!(parse("abc"), rejected("non-numeric token: abc"));
        assert_eq!(parse("inf"), rejected("non-numeric token: inf"));
        assert_eq!(parse("NaN"), rejected("non-numeric token: NaN"));
        assert_eq!(parse("1e999"), rejected("non-numeric token: 1e999"));
        assert_eq!(parse("1_000"), rejected("non-numeric token: 1_000"));
        assert_eq!(parse("0x10"), rejected("non-numeric token: 0x10"));
    }

    #[test]
    fn test_empty_is_noop() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Command::Move {
                primary: 0.05,
                secondary: 0.0
            }
            .to_string(),
            "Move(0.0500, 0.0000)"
        );
        assert_eq!(Command::Stop.to_string(), "Stop");
    }
}

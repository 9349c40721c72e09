use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{config::Config, error::AppError};

/// 单个客户端的限流记录
#[derive(Debug, Default)]
struct ClientRateRecord {
    count: u32,
    last_request: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// 冷却期尚未结束
    Cooldown,
    /// 窗口内次数超限
    MaxAttempts,
}

#[derive(Debug, Clone, Copy)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub remaining_secs: u64,
    pub count: u32,
}

impl From<Rejection> for AppError {
    fn from(r: Rejection) -> Self {
        match r.kind {
            RejectionKind::Cooldown => AppError::CooldownActive {
                remaining_secs: r.remaining_secs,
                count: r.count,
            },
            RejectionKind::MaxAttempts => AppError::MaxAttemptsReached {
                remaining_secs: r.remaining_secs,
                count: r.count,
            },
        }
    }
}

/// 按客户端地址限流的准入服务，保护昂贵的生成接口。
/// 记录表常驻内存且不做淘汰，单进程低流量场景下可以接受。
pub struct RateLimiter {
    clients: Mutex<HashMap<String, ClientRateRecord>>,
    window: Duration,
    max_attempts: u32,
}

impl RateLimiter {
    pub fn new(config: &Config) -> Self {
        Self::with_limits(config.rate_limit_window(), config.rate_limit_max_attempts)
    }

    pub fn with_limits(window: Duration, max_attempts: u32) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            window,
            max_attempts,
        }
    }

    /// 判断该客户端此刻是否准入，并更新其记录
    pub fn admit(&self, identity: &str) -> Result<u32, Rejection> {
        self.admit_at(identity, Instant::now())
    }

    // 检查顺序刻意保持为：先拒绝冷却中的请求，再重置过期窗口，
    // 再计数，最后检查超限。两个 if 相互独立，不要合并成 else 分支，
    // 否则超限分支在时钟回退或并发竞争下的兜底行为会改变。
    fn admit_at(&self, identity: &str, now: Instant) -> Result<u32, Rejection> {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let record = clients.entry(identity.to_string()).or_default();

        if let Some(last) = record.last_request {
            let elapsed = now.duration_since(last);

            // 冷却期内直接拒绝，不触碰记录
            if elapsed < self.window {
                let remaining = self.window - elapsed;
                return Err(Rejection {
                    kind: RejectionKind::Cooldown,
                    remaining_secs: remaining.as_secs_f64().ceil() as u64,
                    count: record.count,
                });
            }

            // 窗口已过，重新给予完整额度
            if elapsed >= self.window {
                record.count = 0;
            }
        }

        record.count += 1;
        record.last_request = Some(now);

        if record.count > self.max_attempts {
            return Err(Rejection {
                kind: RejectionKind::MaxAttempts,
                remaining_secs: self.window.as_secs(),
                count: record.count,
            });
        }

        Ok(record.count)
    }

    pub async fn check_rate_limit(
        self: Arc<Self>,
        req: Request<Body>,
        next: Next,
    ) -> Result<Response, StatusCode> {
        // 从连接信息获取原始IP
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());

        // 优先取代理头中的IP，降级使用连接IP
        let ip = req
            .headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .or_else(|| {
                req.headers()
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
            })
            .or_else(|| remote_ip.as_deref())
            .unwrap_or("unknown")
            .trim()
            .to_string();

        match self.admit(&ip) {
            Ok(count) => {
                tracing::debug!("Rate limit admit for {}: attempt {}", ip, count);
                Ok(next.run(req).await)
            }
            Err(rejection) => {
                tracing::info!(
                    "Rate limit reject for {}: {:?}, {}s remaining",
                    ip,
                    rejection.kind,
                    rejection.remaining_secs
                );
                Ok(AppError::from(rejection).into_response())
            }
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    limiter.check_rate_limit(req, next).await
}

//! 探索の打ち切り条件
//!
//! 反復深化の合間に見る`stop_soft`と、探索中に一定ノードごとに見る
//! `stop_hard`を持つ。具象リミッタのタグ付きenumと、それらを束ねる
//! Compoundで構成する。

use std::time::Instant;

/// 時計を見る間隔（ノード数）
const TIME_CHECK_INTERVAL: u64 = 2048;
/// 通信等の遅延分の持ち時間マージン（秒）
const MOVE_OVERHEAD: f64 = 0.01;

/// 探索リミッタ
#[derive(Debug, Clone)]
pub enum Limiter {
    Node(NodeLimiter),
    MoveTime(MoveTimeLimiter),
    Time(TimeManager),
    Compound(CompoundLimiter),
}

impl Limiter {
    /// 反復深化の合間の打ち切り判定
    pub fn stop_soft(&self, nodes: u64) -> bool {
        match self {
            Limiter::Node(l) => l.stop_soft(nodes),
            Limiter::MoveTime(l) => l.stop_soft(nodes),
            Limiter::Time(l) => l.stop_soft(nodes),
            Limiter::Compound(l) => l.stop_soft(nodes),
        }
    }

    /// 探索中の打ち切り判定
    pub fn stop_hard(&self, nodes: u64) -> bool {
        match self {
            Limiter::Node(l) => l.stop_hard(nodes),
            Limiter::MoveTime(l) => l.stop_hard(nodes),
            Limiter::Time(l) => l.stop_hard(nodes),
            Limiter::Compound(l) => l.stop_hard(nodes),
        }
    }
}

/// ノード数の上限
#[derive(Debug, Clone)]
pub struct NodeLimiter {
    max_nodes: u64,
}

impl NodeLimiter {
    pub fn new(max_nodes: u64) -> NodeLimiter {
        NodeLimiter { max_nodes }
    }

    // ノード数の比較は安いので、softもhardと同じ判定で毎回行う
    pub fn stop_soft(&self, nodes: u64) -> bool {
        self.stop_hard(nodes)
    }

    pub fn stop_hard(&self, nodes: u64) -> bool {
        nodes >= self.max_nodes
    }
}

/// 1手の消費時間の上限
#[derive(Debug, Clone)]
pub struct MoveTimeLimiter {
    start_time: Instant,
    max_time: f64,
}

impl MoveTimeLimiter {
    pub fn new(start_time: Instant, max_time: f64) -> MoveTimeLimiter {
        MoveTimeLimiter { start_time, max_time }
    }

    pub fn stop_soft(&self, _nodes: u64) -> bool {
        self.start_time.elapsed().as_secs_f64() >= self.max_time
    }

    pub fn stop_hard(&self, nodes: u64) -> bool {
        if nodes == 0 || nodes % TIME_CHECK_INTERVAL != 0 {
            return false;
        }
        self.stop_soft(nodes)
    }
}

/// 残り時間と加算
#[derive(Debug, Clone, Copy)]
pub struct TimeLimits {
    pub remaining: f64,
    pub increment: f64,
}

/// 持ち時間制の時間配分
#[derive(Debug, Clone)]
pub struct TimeManager {
    start_time: Instant,
    max_time: f64,
}

impl TimeManager {
    pub fn new(start_time: Instant, limits: TimeLimits) -> TimeManager {
        let remaining = limits.remaining - MOVE_OVERHEAD;
        let max_time = (remaining * 0.05 + limits.increment * 0.5).min(remaining);

        TimeManager { start_time, max_time }
    }

    pub fn stop_soft(&self, _nodes: u64) -> bool {
        self.start_time.elapsed().as_secs_f64() >= self.max_time
    }

    pub fn stop_hard(&self, nodes: u64) -> bool {
        if nodes == 0 || nodes % TIME_CHECK_INTERVAL != 0 {
            return false;
        }
        self.stop_soft(nodes)
    }
}

/// 複数リミッタの合成（どれか1つでも打ち切りなら打ち切り）
#[derive(Debug, Clone, Default)]
pub struct CompoundLimiter {
    limiters: Vec<Limiter>,
}

impl CompoundLimiter {
    pub fn new() -> CompoundLimiter {
        CompoundLimiter::default()
    }

    pub fn add(&mut self, limiter: Limiter) {
        self.limiters.push(limiter);
    }

    pub fn stop_soft(&self, nodes: u64) -> bool {
        self.limiters.iter().any(|l| l.stop_soft(nodes))
    }

    pub fn stop_hard(&self, nodes: u64) -> bool {
        self.limiters.iter().any(|l| l.stop_hard(nodes))
    }
}

//! 随机触发：每个符合条件的对话轮次抽一次签，命中则从候选中等概率选一个表情包

use rand::seq::IndexedRandom;
use rand::Rng;

use super::catalog::MemeEntry;

pub const DEFAULT_TRIGGER_PROBABILITY: f64 = 0.15;

/// 单次均匀抽样与概率比较；p 会被夹到 [0, 1]
pub fn should_trigger(probability: f64) -> bool {
    should_trigger_with(&mut rand::rng(), probability)
}

pub fn should_trigger_with<R: Rng>(rng: &mut R, probability: f64) -> bool {
    let p = if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    };
    rng.random::<f64>() < p
}

/// 等概率选择，不按分类或热度加权
pub fn pick_meme(entries: &[MemeEntry]) -> Option<&MemeEntry> {
    entries.choose(&mut rand::rng())
}

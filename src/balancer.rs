//! Random spreading of requests over the fixed instance pool.

use rand::Rng;

/// Number of instances behind the load-balancing prefix.
pub const POOL_SIZE: usize = 3;

/// Picks an index in `[0, n)`.
pub trait Chooser: Send + Sync + 'static {
    fn choose(&self, n: usize) -> usize;
}

/// Uniform choice from the thread-local RNG. Every call re-rolls.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomChooser;

impl Chooser for RandomChooser {
    fn choose(&self, n: usize) -> usize {
        rand::thread_rng().gen_range(0..n)
    }
}

/// Name of the pool instance at `index`.
pub fn pool_instance_name(index: usize) -> String {
    format!("instance-{}", index)
}

/// Chooses one of the pool instances.
pub fn pick_pool_instance(chooser: &dyn Chooser) -> String {
    pool_instance_name(chooser.choose(POOL_SIZE))
}

use crate::PAGE_SIZE;

pub const DEFAULT_POOL_SIZE: usize = 64;

/// Configuration for the buffer pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of page frames in the buffer pool.
    pub pool_size: usize,
}

impl BufferPoolConfig {
    pub fn new(pool_size: usize) -> Self {
        Self { pool_size }
    }

    /// Creates a configuration that fits in roughly `memory_bytes` of frames.
    pub fn from_memory_size(memory_bytes: usize) -> Self {
        Self::new((memory_bytes / PAGE_SIZE).max(1))
    }

    /// Returns the bytes of page content the pool keeps resident at most.
    pub fn memory_usage(&self) -> usize {
        self.pool_size * PAGE_SIZE
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pool_size == 0 {
            return Err("pool_size must be > 0");
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = BufferPoolConfig::default();
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_memory() {
        let config = BufferPoolConfig::from_memory_size(1024 * 1024);
        assert_eq!(config.pool_size, 256);
        assert_eq!(config.memory_usage(), 1024 * 1024);
        assert_eq!(BufferPoolConfig::from_memory_size(10).pool_size, 1);
    }

    #[test]
    fn test_zero_frames_rejected() {
        assert!(BufferPoolConfig::new(0).validate().is_err());
    }
}

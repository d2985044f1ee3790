//! 帧同步与栅栏值管理模块
//!
//! 栅栏值的分配和每帧的等待目标计算都是纯逻辑，
//! 和真正的 GPU 栅栏对象分离，可以在没有设备的环境里测试。
//!
//! # 设计原则
//!
//! - **单调递增**：栅栏值从 1 开始只增不减，0 保留为
//!   "从未提交过"的哨兵
//! - **逐帧停顿**：命令分配器只有一个，由两帧共用；重置它之前
//!   必须等 GPU 越过上一帧提交时 signal 的值。常量缓冲区的
//!   每帧重写依赖同一个等待：越过之后 GPU 不再读取旧内容
//! - **等待判定纯化**：`needs_wait` 只做比较，真正的阻塞
//!   等待（事件 + INFINITE）留给后端

/// 交换链后缓冲数量（双缓冲）
pub const FRAME_COUNT: usize = 2;

/// 帧节拍器
///
/// 跟踪当前后缓冲槽位、下一个要 signal 的栅栏值，
/// 以及上一帧提交时 signal 的值。
#[derive(Debug, Clone)]
pub struct FramePacer {
    /// 上一帧提交时 signal 的栅栏值；0 表示尚未提交
    last_submitted: u64,
    /// 下一个要 signal 的值
    next_value: u64,
    /// 当前录制中的槽位
    frame_index: usize,
    /// 后缓冲数量
    frame_count: usize,
}

impl FramePacer {
    /// 创建节拍器
    pub fn new(frame_count: usize) -> Self {
        Self {
            last_submitted: 0,
            next_value: 1,
            frame_index: 0,
            frame_count,
        }
    }

    /// 当前录制中的后缓冲槽位
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// 重置共享命令分配器前的等待目标
    ///
    /// 返回上一帧提交时 signal 的值；0 表示尚未提交，无需等待。
    pub fn wait_target(&self) -> u64 {
        self.last_submitted
    }

    /// GPU 完成值为 `completed` 时，是否仍需等待上一帧
    pub fn needs_wait(&self, completed: u64) -> bool {
        completed < self.last_submitted
    }

    /// 排空全部在途工作的等待目标（WaitForGpu）
    ///
    /// 返回最后一次分配的值；0 表示还没有任何提交。
    pub fn drain_target(&self) -> u64 {
        self.next_value - 1
    }

    /// 分配下一个栅栏值
    ///
    /// 帧提交之外的阻塞操作（资源上传拷贝）也从同一个
    /// 计数器取值，保证全局单调。
    pub fn allocate_value(&mut self) -> u64 {
        let value = self.next_value;
        self.next_value += 1;
        value
    }

    /// 结束当前帧：返回提交后应 signal 的栅栏值，
    /// 并把槽位切到下一个后缓冲
    pub fn end_frame(&mut self, next_frame_index: usize) -> u64 {
        let value = self.allocate_value();
        self.last_submitted = value;
        self.frame_index = next_frame_index % self.frame_count;
        value
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(FRAME_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_values_monotonic() {
        let mut pacer = FramePacer::new(FRAME_COUNT);
        let v0 = pacer.end_frame(1);
        let v1 = pacer.end_frame(0);
        let v2 = pacer.end_frame(1);
        assert_eq!((v0, v1, v2), (1, 2, 3));
    }

    #[test]
    fn test_first_use_needs_no_wait() {
        let pacer = FramePacer::new(FRAME_COUNT);
        assert_eq!(pacer.wait_target(), 0);
        assert!(!pacer.needs_wait(0));
    }

    #[test]
    fn test_allocator_reset_gated_on_previous_submit() {
        let mut pacer = FramePacer::new(FRAME_COUNT);

        // 帧 0 提交 signal=1，切到槽位 1
        let value = pacer.end_frame(1);
        assert_eq!(value, 1);

        // GPU 尚未越过提交值时，共享分配器不能重置
        assert!(pacer.needs_wait(0));
        assert_eq!(pacer.wait_target(), value);

        // 越过之后才放行
        assert!(!pacer.needs_wait(value));
    }

    #[test]
    fn test_wait_target_follows_latest_submit() {
        let mut pacer = FramePacer::new(FRAME_COUNT);
        pacer.end_frame(1);
        pacer.end_frame(0);

        // 逐帧停顿：每次都等最近一次提交
        assert_eq!(pacer.wait_target(), 2);
        assert!(pacer.needs_wait(1));
        assert!(!pacer.needs_wait(2));
    }

    #[test]
    fn test_drain_target_covers_all_submits() {
        let mut pacer = FramePacer::new(FRAME_COUNT);
        assert_eq!(pacer.drain_target(), 0);
        pacer.end_frame(1);
        pacer.end_frame(0);
        assert_eq!(pacer.drain_target(), 2);
    }

    #[test]
    fn test_upload_values_share_counter() {
        let mut pacer = FramePacer::new(FRAME_COUNT);
        let upload = pacer.allocate_value();
        let frame = pacer.end_frame(1);
        assert_eq!((upload, frame), (1, 2));
        assert_eq!(pacer.drain_target(), 2);
    }
}

//! 播放会话状态机模块
//!
//! 管理蜂鸣器唯一的播放会话：空闲、播放中、取消中

use log::{debug, info};

/// 播放状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    // 空闲：无声音，无会话
    Idle,

    // 正在播放第 position 个音符
    Playing { position: usize },

    // 取消中（瞬态）：蜂鸣器已静音，会话正在拆除
    Cancelling,
}

/// 播放事件枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// 开始播放长度为 len 的旋律
    Start { len: usize },
    /// 当前音符时长结束
    Advance,
    /// 请求取消（/stop 或新旋律）
    Cancel,
    /// 取消完成，蜂鸣器已静音
    Settled,
}

/// 状态转换结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTransition {
    /// 保持当前状态
    Stay,
    /// 转换到新状态
    Transition(PlaybackState),
}

/// 播放会话
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    current_state: PlaybackState,
    previous_state: Option<PlaybackState>,
    len: usize,
    completed: u32,
    cancelled: u32,
}

impl PlaybackSession {
    /// 创建新的会话实例（空闲）
    pub const fn new() -> Self {
        Self {
            current_state: PlaybackState::Idle,
            previous_state: None,
            len: 0,
            completed: 0,
            cancelled: 0,
        }
    }

    /// 获取当前状态
    pub fn get_current_state(&self) -> PlaybackState {
        self.current_state
    }

    /// 获取上一个状态
    pub fn get_previous_state(&self) -> Option<PlaybackState> {
        self.previous_state
    }

    /// 当前旋律长度
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 自然播放完成的旋律数
    pub fn completed_count(&self) -> u32 {
        self.completed
    }

    /// 被取消的旋律数
    pub fn cancelled_count(&self) -> u32 {
        self.cancelled
    }

    /// 检查是否正在播放
    pub fn is_playing(&self) -> bool {
        matches!(self.current_state, PlaybackState::Playing { .. })
    }

    /// 处理播放事件
    pub fn handle_event(&mut self, event: PlaybackEvent) -> StateTransition {
        let transition = self.get_state_transition(self.current_state, event);

        if let StateTransition::Transition(new_state) = transition {
            self.transition_to_state(new_state, event);
            if let PlaybackEvent::Start { len } = event {
                self.len = len;
            }
        }

        transition
    }

    /// 内部状态转换逻辑
    fn transition_to_state(&mut self, new_state: PlaybackState, event: PlaybackEvent) {
        match (self.current_state, new_state) {
            (PlaybackState::Playing { .. }, PlaybackState::Idle) => {
                self.completed += 1;
                info!("[TONE] Melody finished ({} notes)", self.len);
            }
            (PlaybackState::Playing { position }, PlaybackState::Cancelling) => {
                self.cancelled += 1;
                info!("[TONE] Melody cancelled at note {}/{}", position + 1, self.len);
            }
            _ => debug!("[TONE] {:?} --{:?}--> {:?}", self.current_state, event, new_state),
        }

        self.previous_state = Some(self.current_state);
        self.current_state = new_state;
    }

    /// 获取状态转换规则
    fn get_state_transition(
        &self,
        current_state: PlaybackState,
        event: PlaybackEvent,
    ) -> StateTransition {
        match (current_state, event) {
            // 空旋律：无事可做
            (PlaybackState::Idle, PlaybackEvent::Start { len: 0 }) => StateTransition::Stay,
            (PlaybackState::Cancelling, PlaybackEvent::Start { len: 0 }) => {
                StateTransition::Transition(PlaybackState::Idle)
            }

            // 开始播放
            (PlaybackState::Idle, PlaybackEvent::Start { .. })
            | (PlaybackState::Cancelling, PlaybackEvent::Start { .. }) => {
                StateTransition::Transition(PlaybackState::Playing { position: 0 })
            }

            // 播放中收到新旋律：先取消旧会话
            (PlaybackState::Playing { .. }, PlaybackEvent::Start { .. }) => {
                StateTransition::Transition(PlaybackState::Cancelling)
            }

            // 音符推进
            (PlaybackState::Playing { position }, PlaybackEvent::Advance) => {
                if position + 1 < self.len {
                    StateTransition::Transition(PlaybackState::Playing {
                        position: position + 1,
                    })
                } else {
                    StateTransition::Transition(PlaybackState::Idle)
                }
            }

            // 取消流程
            (PlaybackState::Playing { .. }, PlaybackEvent::Cancel) => {
                StateTransition::Transition(PlaybackState::Cancelling)
            }
            (PlaybackState::Cancelling, PlaybackEvent::Settled) => {
                StateTransition::Transition(PlaybackState::Idle)
            }

            // 默认情况：保持当前状态
            _ => StateTransition::Stay,
        }
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(position: usize) -> PlaybackState {
        PlaybackState::Playing { position }
    }

    #[test]
    fn plays_to_completion() {
        let mut session = PlaybackSession::new();
        assert_eq!(session.get_current_state(), PlaybackState::Idle);

        session.handle_event(PlaybackEvent::Start { len: 3 });
        assert_eq!(session.get_current_state(), playing(0));
        session.handle_event(PlaybackEvent::Advance);
        assert_eq!(session.get_current_state(), playing(1));
        session.handle_event(PlaybackEvent::Advance);
        assert_eq!(session.get_current_state(), playing(2));
        session.handle_event(PlaybackEvent::Advance);
        assert_eq!(session.get_current_state(), PlaybackState::Idle);
        assert_eq!(session.completed_count(), 1);
        assert_eq!(session.get_previous_state(), Some(playing(2)));
    }

    #[test]
    fn cancel_goes_through_cancelling() {
        let mut session = PlaybackSession::new();
        session.handle_event(PlaybackEvent::Start { len: 5 });
        session.handle_event(PlaybackEvent::Advance);
        assert_eq!(
            session.handle_event(PlaybackEvent::Cancel),
            StateTransition::Transition(PlaybackState::Cancelling)
        );
        assert_eq!(
            session.handle_event(PlaybackEvent::Settled),
            StateTransition::Transition(PlaybackState::Idle)
        );
        assert_eq!(session.cancelled_count(), 1);
        assert_eq!(session.completed_count(), 0);
    }

    #[test]
    fn start_while_playing_supersedes() {
        let mut session = PlaybackSession::new();
        session.handle_event(PlaybackEvent::Start { len: 4 });
        session.handle_event(PlaybackEvent::Advance);

        session.handle_event(PlaybackEvent::Start { len: 2 });
        assert_eq!(session.get_current_state(), PlaybackState::Cancelling);
        session.handle_event(PlaybackEvent::Start { len: 2 });
        assert_eq!(session.get_current_state(), playing(0));
        assert_eq!(session.len(), 2);
        assert_eq!(session.cancelled_count(), 1);
    }

    #[test]
    fn idle_ignores_advance_and_cancel() {
        let mut session = PlaybackSession::new();
        assert_eq!(session.handle_event(PlaybackEvent::Advance), StateTransition::Stay);
        assert_eq!(session.handle_event(PlaybackEvent::Cancel), StateTransition::Stay);
        assert_eq!(session.handle_event(PlaybackEvent::Settled), StateTransition::Stay);
        assert_eq!(session.get_current_state(), PlaybackState::Idle);
    }

    #[test]
    fn empty_melody_never_plays() {
        let mut session = PlaybackSession::new();
        assert_eq!(
            session.handle_event(PlaybackEvent::Start { len: 0 }),
            StateTransition::Stay
        );
        assert!(!session.is_playing());

        session.handle_event(PlaybackEvent::Start { len: 1 });
        session.handle_event(PlaybackEvent::Cancel);
        session.handle_event(PlaybackEvent::Start { len: 0 });
        assert_eq!(session.get_current_state(), PlaybackState::Idle);
    }

    #[test]
    fn cancelling_waits_for_settle_or_start() {
        let mut session = PlaybackSession::new();
        session.handle_event(PlaybackEvent::Start { len: 2 });
        session.handle_event(PlaybackEvent::Cancel);
        assert_eq!(session.handle_event(PlaybackEvent::Advance), StateTransition::Stay);
        assert_eq!(session.handle_event(PlaybackEvent::Cancel), StateTransition::Stay);
        assert_eq!(session.get_current_state(), PlaybackState::Cancelling);
    }
}

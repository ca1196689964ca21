//! 播放状态机与音阶量化板上自检程序
//!
//! 在真实硬件上验证播放会话的状态转换和量化器，不需要网络

#![no_std]
#![no_main]

extern crate alloc;

use esp_hal::clock::CpuClock;
use esp_println::println;
use light_orchestra_node::playback::{PlaybackEvent, PlaybackSession, PlaybackState};
use light_orchestra_node::quantizer::{Scale, scale_reading};

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("❌ 自检失败: {}", info);
    loop {}
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let _peripherals = esp_hal::init(config);

    // Initialize heap allocator
    esp_alloc::heap_allocator!(size: 32 * 1024);

    println!("=== 播放状态机自检 ===");

    let mut session = PlaybackSession::new();

    // 初始状态
    println!("\n1. 测试初始状态");
    assert_eq!(session.get_current_state(), PlaybackState::Idle);
    println!("✅ 初始状态正确: {:?}", session.get_current_state());

    // 完整播放
    println!("\n2. 测试完整播放");
    session.handle_event(PlaybackEvent::Start { len: 3 });
    assert_eq!(session.get_current_state(), PlaybackState::Playing { position: 0 });
    session.handle_event(PlaybackEvent::Advance);
    session.handle_event(PlaybackEvent::Advance);
    assert_eq!(session.get_current_state(), PlaybackState::Playing { position: 2 });
    session.handle_event(PlaybackEvent::Advance);
    assert_eq!(session.get_current_state(), PlaybackState::Idle);
    println!("✅ 播放完成后回到空闲, 完成次数 {}", session.completed_count());

    // 新旋律打断旧旋律
    println!("\n3. 测试新旋律抢占");
    session.handle_event(PlaybackEvent::Start { len: 4 });
    session.handle_event(PlaybackEvent::Advance);
    session.handle_event(PlaybackEvent::Cancel);
    assert_eq!(session.get_current_state(), PlaybackState::Cancelling);
    session.handle_event(PlaybackEvent::Start { len: 2 });
    assert_eq!(session.get_current_state(), PlaybackState::Playing { position: 0 });
    assert_eq!(session.len(), 2);
    println!("✅ 抢占经过取消状态后从头播放新旋律");

    // 停止
    println!("\n4. 测试停止");
    session.handle_event(PlaybackEvent::Cancel);
    session.handle_event(PlaybackEvent::Settled);
    assert_eq!(session.get_current_state(), PlaybackState::Idle);
    println!("✅ 停止后空闲, 取消次数 {}", session.cancelled_count());

    // 非法事件
    println!("\n5. 测试非法事件");
    session.handle_event(PlaybackEvent::Advance);
    session.handle_event(PlaybackEvent::Settled);
    assert_eq!(session.get_current_state(), PlaybackState::Idle);
    println!("✅ 空闲状态忽略推进和完成事件");

    // 量化器
    println!("\n6. 测试音阶量化");
    let scale = Scale::default();
    let readings = [0, 50, 150, 250, 350, 450, 550, 650];
    let notes = scale.quantize(&readings);
    for (reading, note) in readings.iter().zip(notes.iter()) {
        println!("  读数 {:>3} -> {} Hz", reading, note.frequency_hz);
    }
    let expected = [262, 262, 294, 330, 349, 392, 440, 494];
    for (note, hz) in notes.iter().zip(expected.iter()) {
        assert_eq!(note.frequency_hz, *hz);
    }
    assert_eq!(scale.classify(scale_reading(u16::MAX)).frequency_hz, 494);
    println!("✅ 量化结果正确, 满量程读数归入最高音");

    println!("\n=== 所有测试通过! ===");

    // 保持程序运行
    loop {
        // 简单的延迟
        for _ in 0..1000000 {
            unsafe {
                core::ptr::read_volatile(&0u32);
            }
        }
    }
}

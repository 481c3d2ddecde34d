//! Applications linked into the firmware image.
use std::time::Duration;

use loader::{
    registry::{AppCategory, AppDescriptor},
    AppContext, AppFlags,
};

fn clock_main(ctx: AppContext) -> i32 {
    let mut seconds = 0u64;
    while !ctx.sleep_or_exit(Duration::from_secs(1)) {
        seconds += 1;
        tracing::info!("[clock] {:02}:{:02}", seconds / 60, seconds % 60);
    }
    0
}

fn hello_main(ctx: AppContext) -> i32 {
    match ctx.args() {
        Some(args) => println!("hello, {}", args),
        None => println!("hello"),
    }
    0
}

fn counter_main(ctx: AppContext) -> i32 {
    let limit: u32 = ctx.args().and_then(|a| a.trim().parse().ok()).unwrap_or(5);
    for i in 1..=limit {
        if ctx.sleep_or_exit(Duration::from_millis(500)) {
            return 1;
        }
        println!("[counter] {}/{}", i, limit);
    }
    0
}

fn settings_main(ctx: AppContext) -> i32 {
    println!("settings open, 'close' to leave");
    ctx.wait_exit();
    0
}

fn power_main(ctx: AppContext) -> i32 {
    println!("power info: running on host power");
    ctx.wait_exit();
    0
}

pub fn builtin_apps() -> Vec<AppDescriptor> {
    vec![
        AppDescriptor::internal("Clock", clock_main).with_flags(AppFlags::INSOMNIA_SAFE),
        AppDescriptor::internal("Hello", hello_main),
        AppDescriptor::internal("Counter", counter_main).with_stack_size(4096),
        AppDescriptor::internal("Settings", settings_main).with_category(AppCategory::Settings),
        AppDescriptor::internal("Power", power_main).with_category(AppCategory::Settings),
    ]
}

#![no_main]

use libfuzzer_sys::fuzz_target;
use z80_core::{
    BankingState, CancellationToken, CoreConfig, ExecutionController, NullPorts, Platform,
    ProgramImage, SystemBus,
};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let control = data[0];
    let interrupt = data[1];
    let program = &data[2..];
    let Ok(image) = ProgramImage::from_bytes(0, &program[..program.len().min(0x4000)]) else {
        return;
    };

    let bus = SystemBus::with_banking(
        Platform::Banked(z80_core::BankingLayout::default()),
        BankingState::from_control(control),
        NullPorts,
    );
    let config = CoreConfig {
        chunk_steps: 64,
        ..CoreConfig::default()
    };
    let mut controller = ExecutionController::with_bus(bus, config);
    if controller.reset(Some(&image), None).is_err() {
        return;
    }

    let cancel = CancellationToken::new();
    cancel.cancel();
    let _ = controller.run_until_stop(&[][..], &cancel);
    let _ = controller.signal_interrupt(interrupt & 1 == 1, interrupt);
    for _ in 0..64 {
        let _ = controller.step();
    }
    let _ = controller.registers();
});

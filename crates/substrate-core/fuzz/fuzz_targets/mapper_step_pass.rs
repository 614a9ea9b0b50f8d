#![no_main]

use libfuzzer_sys::fuzz_target;
use substrate_core::{
    ConsoleConfig, CycleBudget, Decoder, MemoryLayout, MemoryMapper, Position, ProgramMetadata,
    Scheduler, SubstrateConfig,
};

fuzz_target!(|data: &[u8]| {
    if data.len() < 12 {
        return;
    }

    let word = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let _ = Decoder::decode(word);

    let address = u64::from(u32::from_le_bytes([data[4], data[5], data[6], data[7]]));
    let width = data[8] & 0x0F;
    if let Ok(mut mapper) = MemoryMapper::new(&MemoryLayout::default(), ConsoleConfig::default()) {
        let _ = mapper.write(address, width, u64::from(word));
        let _ = mapper.read(address, width);
        let _ = mapper.peek(address, width);
    }

    let Ok(mut scheduler) = Scheduler::new(SubstrateConfig::default()) else {
        return;
    };
    let budget = u64::from(data[9]) * 16;
    let split = 10 + usize::from(data[10]) % (data.len() - 10);
    let _ = scheduler.register_core(Position::new(0, 0), &data[10..split], &ProgramMetadata::unsigned());
    let _ = scheduler.register_core(Position::new(1, 0), &data[split..], &ProgramMetadata::unsigned());
    let results = scheduler.execute_pass(CycleBudget::cycles(budget));
    let spent: u64 = results.iter().map(|result| result.cycles_executed).sum();
    assert!(spent <= budget);

    if let Ok(bytes) = scheduler.serialize() {
        let mut restored = match Scheduler::new(SubstrateConfig::default()) {
            Ok(restored) => restored,
            Err(_) => return,
        };
        assert!(restored.deserialize(&bytes).is_ok());
        assert_eq!(restored.list_active_cores(), scheduler.list_active_cores());
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use protolite::MessageExt;

fuzz_target!(|data: &[u8]| {
    // Malformed input must fail cleanly, and anything that decodes must
    // encode again.
    let mut msg = protolite::test::Test::default();
    if msg.decode_flat::<32>(data).is_ok() {
        protolite::tests::assert_roundtrip(&msg);
    }
});

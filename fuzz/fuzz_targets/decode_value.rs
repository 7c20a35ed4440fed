#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // decoding must never panic, and whatever decodes must re-encode
    if let Ok(value) = yajbe::decode_from_slice(data) {
        let _ = yajbe::encode_to_vec(&value);
    }
});

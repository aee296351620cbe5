#![no_main]

use arbitrary::Arbitrary;
use hrmail::fuzz_api::verify_session_token;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    secret: String,
    token: String,
}

fuzz_target!(|input: Input| {
    let _ = verify_session_token(&input.secret, &input.token);
});

#[test]
fn ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/bot_methods_*.rs");
}

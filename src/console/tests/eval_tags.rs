use super::*;
use crate::console::tags;

#[test]
fn test_tagged_literals() {
    Tester::new_single_source_expect_ok("detag a literal", "
        %t = 'Hello';
        return detag(%t);
    ").assert_result("Hello");

    Tester::new_single_source_expect_ok("literal is not the text", "
        %t = 'Hello';
        return (%t $= \"Hello\") SPC strlen(%t);
    ").assert_result("0 2");

    Tester::new_single_source_expect_ok("same text same tag", "
        %a = 'Msg';
        %b = 'msg';
        return %a $= %b;
    ").assert_result("1");

    Tester::new_single_source_expect_ok("plain text passes through", "
        return detag(\"plain\") @ detag(42);
    ").assert_result("plain42");
}

#[test]
fn test_tagged_string_functions() {
    Tester::new_single_source_expect_ok("deduplicated ignoring case", "
        return addTaggedString(\"Foo\") $= addTaggedString(\"FOO\");
    ").assert_result("1");

    Tester::new_single_source_expect_ok("first spelling is kept", "
        %t = addTaggedString(\"Foo\");
        addTaggedString(\"FOO\");
        return getTaggedString(%t);
    ").assert_result("Foo");

    Tester::new_single_source_expect_ok("released at zero references", "
        %t = addTaggedString(\"Gone\");
        addTaggedString(\"Gone\");
        removeTaggedString(%t);
        %r = getTaggedString(%t);
        removeTaggedString(%t);
        return %r @ \"|\" @ getTaggedString(%t);
    ").assert_result("Gone|");

    Tester::new_single_source_expect_ok("bare id", "
        %t = addTaggedString(\"Bare\");
        %id = getSubStr(%t, 1);
        return %id SPC getTaggedString(%id);
    ").assert_result("1 Bare");

    Tester::new_single_source_expect_ok("not a tag", "
        removeTaggedString(\"nope\");
        return getTaggedString(\"nope\");
    ")
        .assert_result_empty()
        .assert_logged("is not a tagged string");
}

#[test]
fn test_host_tags() {
    let mut tester = Tester::new("host tags").run().expect_ok();
    let id = tester.console().tags_mut().tag("Host");
    assert_eq!(tester.console().tags().lookup("HOST"), Some(id));
    assert_eq!(tester.console().tags().refcount(id), 1);

    // Script literals reuse the host's tag without adding a reference
    let mut tester = tester.eval("return detag('host');").assert_result("Host");
    assert_eq!(tester.console().tags().refcount(id), 1);

    tester.console().set_global("unknown", Value::from(tags::encode(99)));
    let tester = tester.eval("return detag($unknown);");
    assert_eq!(tester.result().to_text(), tags::encode(99));

    let encoded = tags::encode(id);
    tester
        .eval(&format!("return getTaggedString({});", id))
        .assert_result("Host")
        .eval("return addTaggedString(\"host\");")
        .assert_result(&encoded);
}

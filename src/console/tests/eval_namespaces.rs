use super::*;

#[test]
fn test_parent_calls() {
    Tester::new_single_source_expect_ok("linked chain", "
        function A::greet() { return \"A\"; }
        function B::greet() { return \"B\" @ Parent::greet(); }
        function C::greet() { return Parent::greet() @ \"!\"; }
        linkNamespaces(\"B\", \"A\");
        linkNamespaces(\"C\", \"B\");
        return C::greet();
    ").assert_result("BA!").assert_no_warnings();

    Tester::new_single_source_expect_ok("no parent function", "
        function Lonely::f() { return \"x\" @ Parent::f(); }
        return Lonely::f();
    ")
        .assert_result("x")
        .assert_logged("no parent function 'f'");
}

#[test]
fn test_packages() {
    Tester::new_single_source_expect_ok("activate and deactivate", "
        function base() { return \"base\"; }
        package Loud {
            function base() { return \"LOUD \" @ Parent::base(); }
        };
        %r = base();
        activatePackage(Loud);
        %r = %r @ \" / \" @ base();
        deactivatePackage(Loud);
        return %r @ \" / \" @ base();
    ").assert_result("base / LOUD base / base");

    Tester::new_single_source_expect_ok("newest package wins", "
        function Shape::name(%this) { return \"shape\"; }
        package First {
            function Shape::name(%this) { return \"first \" @ Parent::name(%this); }
        };
        package Second {
            function Shape::name(%this) { return \"second \" @ Parent::name(%this); }
        };
        activatePackage(First);
        activatePackage(Second);
        %r = Shape::name(0);
        deactivatePackage(First);
        return %r @ \" | \" @ Shape::name(0);
    ").assert_result("second first shape | shape");

    Tester::new_single_source_expect_ok("unknown package", "
        activatePackage(Nope);
        return isPackage(Nope);
    ")
        .assert_result("0")
        .assert_logged("unknown package 'Nope'");
}

#[test]
fn test_object_namespaces() {
    Tester::new_single_source_expect_ok("named object methods", "
        function Rex::speak(%this) {
            return %this.getName() SPC \"barks\";
        }
        new ScriptObject(Rex);
        return Rex.speak();
    ").assert_result("Rex barks");

    Tester::new_single_source_expect_ok("class and superClass", "
        function Animal::kind(%this) { return \"animal\"; }
        function Cat::kind(%this) { return \"cat, \" @ Parent::kind(%this); }
        new ScriptObject(Tom) {
            class = \"Cat\";
            superClass = \"Animal\";
        };
        return Tom.kind();
    ").assert_result("cat, animal").assert_no_warnings();

    Tester::new_single_source_expect_ok("native class methods", "
        new ScriptObject(Plain);
        return Plain.getClassName();
    ").assert_result("ScriptObject");

    Tester::new_single_source_expect_ok("methods fall back to global functions", "
        function describe(%obj) {
            return \"object \" @ %obj.getName();
        }
        new ScriptObject(Thing);
        return Thing.describe();
    ").assert_result("object Thing");

    Tester::new_single_source_expect_ok("unknown method", "
        new ScriptObject(Mute);
        return Mute.speak();
    ")
        .assert_result_empty()
        .assert_logged("unknown command 'speak'");
}

#[test]
fn test_namespace_link_conflicts() {
    Tester::new_single_source_expect_ok("different parent", "
        new ScriptObject(First) { class = \"Dog\"; superClass = \"Pet\"; };
        new ScriptObject(Second) { class = \"Dog\"; superClass = \"Wolf\"; };
    ").assert_logged("cannot link namespace 'Dog'");

    Tester::new_single_source_expect_ok("deleting releases the links", "
        function Wolf::howl(%this) { return \"awoo\"; }
        new ScriptObject(First) { class = \"Dog\"; superClass = \"Pet\"; };
        First.delete();
        new ScriptObject(Second) { class = \"Dog\"; superClass = \"Wolf\"; };
        return Second.howl();
    ").assert_result("awoo").assert_no_warnings();

    Tester::new_single_source_expect_ok("cycle", "
        linkNamespaces(\"X\", \"Y\");
        return linkNamespaces(\"Y\", \"X\");
    ")
        .assert_result("0")
        .assert_logged("cycle");
}

#[test]
fn test_function_queries() {
    Tester::new_single_source_expect_ok("isMethod and isFunction", "
        function Dog::bark(%this) {}
        function helper() {}
        return isMethod(\"Dog\", \"bark\") SPC isFunction(\"Dog\") SPC isFunction(\"helper\");
    ").assert_result("1 0 1");
}

#[test]
fn test_host_methods() {
    let mut tester = Tester::new_single_source_expect_ok("host", "
        new ScriptObject(Probe);
        function Probe::twice(%this, %x) { return %x * 2; }
    ");

    tester.console().register_method("ScriptObject", "ping", 0, 1, |console, call| {
        let name = call.object
            .and_then(|id| console.object(id))
            .and_then(|object| object.name())
            .unwrap_or("")
            .to_string();
        Ok(Value::from(format!("pong {} {}", name, call.arg(0))))
    });

    let probe = tester.console().find_object("Probe").unwrap();
    let twice = tester.console().call_method(probe, "twice", &[Value::Int(4)]).unwrap();
    assert_eq!(twice.to_text(), "8");
    let ping = tester.console().call_method(probe, "ping", &[Value::from("x")]).unwrap();
    assert_eq!(ping.to_text(), "pong Probe x");
    let gone = tester.console().call_method(1_000_000, "ping", &[]).unwrap();
    assert!(gone.is_empty());

    tester.console().link_namespaces("Hound", "ScriptObject").unwrap();
    assert!(tester.console().link_namespaces("ScriptObject", "Hound").is_err());

    tester
        .eval("return Probe.ping(\"y\") SPC isMethod(\"Hound\", \"ping\");")
        .assert_result("pong Probe y 1")
        .assert_logged("unable to find object 1000000");
}

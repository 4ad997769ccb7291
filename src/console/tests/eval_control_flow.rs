use super::*;

#[test]
fn test_if_else() {
    Tester::new_single_source_expect_ok("absent takes the else branch", "
        if (%obj)
            return \"then\";
        else
            return \"else\";
    ").assert_result("else");

    Tester::new_single_source_expect_ok("else if chain", "
        %v = 2;
        if (%v == 1) %r = \"one\";
        else if (%v == 2) %r = \"two\";
        else %r = \"many\";
        return %r;
    ").assert_result("two");

    Tester::new_single_source_expect_ok("string truthiness", "
        %r = \"\";
        if (\"false\") %r = %r @ \"a\";
        if (\"FALSE\") %r = %r @ \"b\";
        if (\"0.0\") %r = %r @ \"c\";
        if (\"word\") %r = %r @ \"d\";
        if (\" 2 \") %r = %r @ \"e\";
        return %r;
    ").assert_result("de");
}

#[test]
fn test_for_without_test_runs_until_break() {
    Tester::new_single_source_expect_ok("break after seven", "
        %n = 0;
        for (;;) {
            %n++;
            if (%n == 7)
                break;
        }
        return %n;
    ").assert_result("7");

    Tester::new_single_source_expect_ok("only the test is missing", "
        for (%i = 0; ; %i++) {
            if (%i >= 12)
                break;
        }
        return %i;
    ").assert_result("12");
}

#[test]
fn test_loops() {
    Tester::new_single_source_expect_ok("continue skips the rest of the body", "
        %sum = 0;
        for (%i = 0; %i < 10; %i++) {
            if (%i % 2)
                continue;
            %sum += %i;
        }
        return %sum;
    ").assert_result("20");

    Tester::new_single_source_expect_ok("while", "
        %n = 1;
        while (%n < 100)
            %n *= 3;
        return %n;
    ").assert_result("243");

    Tester::new_single_source_expect_ok("do while runs at least once", "
        %n = 0;
        do {
            %n++;
        } while (false);
        return %n;
    ").assert_result("1");

    Tester::new_single_source_expect_ok("break leaves the innermost loop only", "
        %count = 0;
        for (%i = 0; %i < 3; %i++) {
            for (%j = 0; %j < 10; %j++) {
                if (%j == 2)
                    break;
                %count++;
            }
        }
        return %count;
    ").assert_result("6");

    Tester::new_single_source_expect_ok("return leaves every loop", "
        function find(%limit) {
            for (%i = 0; %i < 100; %i++) {
                while (true) {
                    if (%i == %limit)
                        return \"found\" SPC %i;
                    break;
                }
            }
            return \"none\";
        }
        return find(4);
    ").assert_result("found 4");
}

#[test]
fn test_switch() {
    Tester::new_single_source_expect_ok("numeric", "
        %v = \"2.0\";
        switch (%v) {
            case 1:
                %r = \"one\";
            case 2:
                %r = \"two\";
            default:
                %r = \"other\";
        }
        return %r;
    ").assert_result("two");

    Tester::new_single_source_expect_ok("alternatives with or", "
        switch (3) {
            case 1 or 3:
                return \"odd\";
            case 2 or 4:
                return \"even\";
        }
        return \"none\";
    ").assert_result("odd");

    Tester::new_single_source_expect_ok("string", "
        switch$ (\"Apple\") {
            case \"pear\":
                return \"pear\";
            case \"apple\":
                return \"fruit\";
            default:
                return \"unknown\";
        }
    ").assert_result("fruit");

    Tester::new_single_source_expect_ok("default", "
        switch$ (\"x\") {
            case \"y\":
                %r = 1;
            default:
                %r = 2;
        }
        return %r;
    ").assert_result("2");

    Tester::new_single_source_expect_ok("break inside a switch leaves the loop", "
        for (%i = 0; %i < 10; %i++) {
            switch (%i) {
                case 3:
                    break;
            }
        }
        return %i;
    ").assert_result("3");
}

#[test]
fn test_break_outside_loop_is_recovered() {
    Tester::new_single_source_expect_ok("in a function", "
        function f() {
            break;
            return \"not reached\";
        }
        %r = f();
        return \"after\" @ %r;
    ")
        .assert_result("after")
        .assert_logged("break or continue outside of a loop");

    Tester::new_single_source_expect_ok("at top level", "
        continue;
        $after = 1;
    ")
        .assert_result_empty()
        .assert_global("after", "")
        .assert_logged("break or continue outside of a loop");
}

#[test]
fn test_top_level_return() {
    Tester::new("return stops the unit")
        .with_source("$a = 1; return \"early\"; $a = 2;")
        .with_source("return $a;")
        .run()
        .expect_ok()
        .assert_result("1");
}

#[test]
fn test_compile_errors() {
    Tester::new_single_source_expect_compile_err("missing operand", "
        %a = 1;
        %b = ;
    ")
        .assert_line(3)
        .assert_ctx_has("%b = ;");

    Tester::new_single_source_expect_compile_err("unbalanced block", "
        function f() {
            return 1;
    ");

    Tester::new_single_source_expect_compile_err("stray else", "else return 1;")
        .assert_msg_has("else");

    // Nothing of a unit that fails to compile runs
    Tester::new("no partial evaluation")
        .with_source("$ran = 1; %x = (;")
        .run()
        .expect_compile_err();
}

#[test]
fn test_deep_nesting() {
    let nested = format!("return {}7{};", "(".repeat(500), ")".repeat(500));
    Tester::new_single_source_expect_ok("nested parentheses", &nested).assert_result("7");

    let nested = format!("return {}1{};", "(".repeat(100_000), ")".repeat(100_000));
    Tester::new_single_source_expect_compile_err("too many parentheses", &nested)
        .assert_msg_has("nesting is deeper than");

    let negations = format!("return {}1;", "!".repeat(5000));
    Tester::new_single_source_expect_compile_err("too many prefix operators", &negations)
        .assert_msg_has("nesting is deeper than");

    let blocks = format!("{}{}", "{".repeat(5000), "}".repeat(5000));
    Tester::new_single_source_expect_compile_err("too many blocks", &blocks)
        .assert_msg_has("nesting is deeper than");
}

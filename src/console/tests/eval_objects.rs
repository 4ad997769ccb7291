use super::*;
use crate::console::sim::{ClassRep, FieldType, PersistentField, SetterOutcome};

#[test]
fn test_object_fields() {
    Tester::new_single_source_expect_ok("declared and assigned", "
        new ScriptObject(Foo) {
            a = 1;
            b = \"two\";
        };
        Foo.c = Foo.a + 2;
        return Foo.a SPC Foo.getFieldValue(\"b\") SPC Foo.c SPC Foo.getDynamicFieldCount();
    ")
        .assert_result("1 two 3 3")
        .for_object("Foo", |object| {
            object.assert_class("ScriptObject").assert_field("c", "3");
        });

    Tester::new_single_source_expect_ok("field names ignore case", "
        %o = new ScriptObject();
        %o.Score = 5;
        %o.setFieldValue(\"LIVES\", 3);
        return %o.score SPC %o.lives;
    ").assert_result("5 3");

    Tester::new_single_source_expect_ok("indexed dynamic field", "
        new ScriptObject(Bag);
        Bag.slot[2] = \"x\";
        Bag.grid[1, 2] = \"y\";
        return Bag.slot2 @ Bag.grid1_2;
    ").assert_result("xy");

    Tester::new_single_source_expect_ok("empty removes a dynamic field", "
        new ScriptObject(Bag) { a = 1; b = 2; };
        Bag.a = \"\";
        return Bag.getDynamicFieldCount();
    ").assert_result("1");
}

#[test]
fn test_persistent_fields() {
    Tester::new_single_source_expect_ok("class is frozen once registered", "
        new ScriptObject(Locked) { class = \"Door\"; };
        Locked.class = \"Window\";
        return Locked.class;
    ")
        .assert_result("Door")
        .assert_logged("cannot set field 'class'");

    Tester::new_single_source_expect_ok("bool field", "
        new ScriptObject(Keep) { canSave = \"false\"; };
        %r = Keep.canSave;
        Keep.canSave = \"yes\";
        return %r @ Keep.canSave;
    ").assert_result("01");

    Tester::new_single_source_expect_ok("default", "
        %o = new ScriptObject();
        return %o.canSave;
    ").assert_result("1");
}

#[test]
fn test_object_ids() {
    Tester::new_single_source_expect_ok("deleted ids are gone for good", "
        %a = new ScriptObject();
        %b = new ScriptObject();
        %first = %a;
        %a.delete();
        %c = new ScriptObject();
        return isObject(%first) SPC nameToID(%first) SPC (%c > %b);
    ").assert_result("0 -1 1");

    Tester::new_single_source_expect_ok("lookup by name and id", "
        new ScriptObject(Named);
        %id = Named.getId();
        return (nameToID(\"Named\") == %id) @ isObject(%id) @ isObject(\"named\") @ isObject(\"\");
    ").assert_result("1110");

    Tester::new_single_source_expect_ok("ids out of range", "
        %o = new ScriptObject();
        return isObject(4294967296 + %o) SPC isObject(-%o) SPC isObject(%o);
    ").assert_result("0 0 1");

    let tester = Tester::new_single_source_expect_ok("dynamic ids", "
        return new ScriptObject(First);
    ");
    assert_eq!(tester.result().to_int(), i64::from(ConsoleConfig::default().first_dynamic_id));
    tester.for_object("First", |object| {
        assert_eq!(object.id(), ConsoleConfig::default().first_dynamic_id);
    });
}

#[test]
fn test_object_names() {
    Tester::new_single_source_expect_ok("name collision", "
        new ScriptObject(Dup);
        %second = new ScriptObject(Dup);
        return %second.getName() @ \"|\" @ isObject(%second);
    ")
        .assert_result("|1")
        .assert_logged("already in use");

    Tester::new_single_source_expect_ok("setName", "
        %o = new ScriptObject();
        %o.setName(\"Renamed\");
        return (Renamed.getId() == %o) @ Renamed.getName();
    ").assert_result("1Renamed");

    Tester::new_single_source_expect_ok("names are freed on delete", "
        new ScriptObject(Reused);
        Reused.delete();
        new ScriptObject(Reused);
        return isObject(Reused);
    ").assert_result("1").assert_no_warnings();
}

#[test]
fn test_containers() {
    Tester::new_single_source_expect_ok("nested declaration", "
        new SimGroup(Root) {
            new ScriptObject(ChildA);
            new SimGroup(Inner) {
                new ScriptObject(ChildB);
            };
        };
        return Root.getCount() SPC Inner.getCount() SPC (Root.getObject(1) == Inner.getId());
    ")
        .assert_result("2 1 1")
        .for_object("Root", |object| {
            object.assert_class("SimGroup").assert_num_children(2);
        })
        .for_object("Root/Inner/ChildB", |object| {
            object.assert_class("ScriptObject");
        });

    Tester::new_single_source_expect_ok("deleting a set keeps the members", "
        new ScriptObject(Kept);
        new SimSet(Loose);
        Loose.add(Kept);
        Loose.delete();
        new SimGroup(Owner);
        new ScriptObject(Owned);
        Owner.add(Owned);
        Owner.delete();
        return isObject(Kept) SPC isObject(Owned) SPC Kept.getGroup();
    ")
        .assert_result("1 0 -1")
        .assert_no_object("Owned");

    Tester::new_single_source_expect_ok("adding moves the object", "
        new SimSet(One);
        new SimSet(Two);
        new ScriptObject(Item);
        One.add(Item);
        Two.add(Item);
        return One.getCount() SPC Two.isMember(Item);
    ").assert_result("0 1");

    Tester::new_single_source_expect_ok("clear", "
        new SimSet(Set) {
            new ScriptObject(InSet);
        };
        new SimGroup(Group) {
            new ScriptObject(InGroup);
        };
        Set.clear();
        Group.clear();
        return Set.getCount() @ Group.getCount() @ isObject(InSet) @ isObject(InGroup);
    ").assert_result("0010");

    Tester::new_single_source_expect_ok("a group cannot contain itself", "
        new SimGroup(Outer) {
            new SimGroup(Nested);
        };
        Nested.add(Outer);
        return Outer.getGroup() SPC Outer.getObject(5);
    ")
        .assert_result("-1 -1")
        .assert_logged("cannot contain itself");

    Tester::new_single_source_expect_ok("plain objects do not contain", "
        new ScriptObject(NotASet) {
            new ScriptObject(Orphan);
        };
        return Orphan.getGroup();
    ")
        .assert_result("-1")
        .assert_logged("not a container");
}

#[test]
fn test_callbacks() {
    Tester::new_single_source_expect_ok("onAdd and onRemove", "
        function Watched::onAdd(%this) { $log = $log @ \"add \" @ %this.getName(); }
        function Watched::onRemove(%this) { $log = $log @ \" remove\"; }
        new ScriptObject(Watched);
        Watched.delete();
        return $log;
    ").assert_result("add Watched remove");

    Tester::new_single_source_expect_ok("children are removed with their group", "
        function Leaf::onRemove(%this) { $removed++; }
        new SimGroup(Tree) {
            new ScriptObject() { class = \"Leaf\"; };
            new ScriptObject() { class = \"Leaf\"; };
        };
        Tree.delete();
        return $removed;
    ").assert_result("2");
}

#[test]
fn test_copy_source() {
    Tester::new_single_source_expect_ok("fields are copied first", "
        new ScriptObject(Base) {
            size = 10;
            color = \"red\";
        };
        new ScriptObject(Copy : Base) {
            color = \"blue\";
        };
        return Copy.size SPC Copy.color SPC Base.color;
    ").assert_result("10 blue red");

    Tester::new_single_source_expect_ok("missing source", "
        new ScriptObject(Copy : Nothing) { a = 1; };
        return Copy.a;
    ")
        .assert_result("1")
        .assert_logged("to copy fields from");
}

#[test]
fn test_datablocks() {
    Tester::new_single_source_expect_ok("redefinition updates in place", "
        datablock SimDataBlock(Fast) {
            speed = 10;
        };
        %first = Fast.getId();
        datablock SimDataBlock(Fast) {
            speed = 20;
        };
        return Fast.speed SPC Fast.getId() SPC (Fast.getId() == %first);
    ").assert_result("20 3 1");

    Tester::new_single_source_expect_ok("datablock inherits from another", "
        datablock SimDataBlock(Slow) { speed = 1; mass = 5; };
        datablock SimDataBlock(Heavy : Slow) { mass = 50; };
        return Heavy.speed SPC Heavy.mass SPC Heavy.getId();
    ").assert_result("1 50 4");

    Tester::new_single_source_expect_ok("not a datablock class", "
        datablock ScriptObject(Bad) { a = 1; };
        return isObject(Bad);
    ")
        .assert_result("0")
        .assert_logged("'ScriptObject' is not a datablock class");
}

#[test]
fn test_object_errors_are_recovered() {
    Tester::new_single_source_expect_ok("unknown class", "
        %o = new NoSuchClass(Nope);
        return %o;
    ")
        .assert_result("0")
        .assert_logged("unknown class 'NoSuchClass'")
        .assert_no_object("Nope");

    Tester::new_single_source_expect_ok("missing object", "
        Ghost.hp = 3;
        return Ghost.hp;
    ")
        .assert_result_empty()
        .assert_logged("unable to find object 'Ghost'");
}

#[test]
fn test_dump() {
    Tester::new_single_source_expect_ok("dump", "
        new ScriptObject(Dumped) { hp = 3; };
        Dumped.dump();
    ")
        .assert_logged("ScriptObject")
        .assert_logged("hp = \"3\"")
        .assert_logged("canSave = \"1\"");
}

#[test]
fn test_host_class() {
    let mut tester = Tester::new("host class").run().expect_ok();
    tester.console().register_class(ClassRep::new("Clamp")
        .with_parent("SimObject")
        .with_field(PersistentField::new("level", FieldType::Int).with_setter(|_, value| {
            match value.to_int() {
                v if v < 0 => SetterOutcome::Reject,
                v if v > 10 => SetterOutcome::Accept(Value::Int(10)),
                _ => SetterOutcome::Accept(value.clone()),
            }
        }))
        .with_field(PersistentField::array("slots", FieldType::Float, 3))
        .with_field(PersistentField::new("label", FieldType::String).with_getter(|_, stored| {
            Value::from(stored.to_text().to_uppercase())
        }))
    ).unwrap();
    assert!(tester.console().register_class(ClassRep::new("Clamp")).is_err());
    assert!(tester.console().register_class(ClassRep::new("Orphan").with_parent("Missing")).is_err());

    tester
        .eval("
            new Clamp(Knob) {
                level = 50;
                slots[0] = 1.5;
                slots[2] = \"2\";
                label = \"quiet\";
            };
            Knob.level = -1;
            Knob.slots[5] = 1;
            return Knob.level SPC Knob.slots[0] SPC Knob.slots[2] SPC Knob.label;
        ")
        .assert_result("10 1.5 2 QUIET")
        .assert_logged("value rejected")
        .for_object("Knob", |object| {
            object.assert_class("Clamp").assert_field("level", "10");
        })
        .eval("return Knob.isMemberOfClass(\"SimObject\") @ Knob.isMemberOfClass(\"SimSet\");")
        .assert_result("10");
}

//! Transaction dispatch and address resolution through an owner hierarchy.

#![allow(clippy::pedantic, clippy::nursery)]

use std::cell::RefCell;
use std::rc::Rc;

use log as _;
use proptest as _;
use register_model::{
    AddressOptions, BitOptions, Context, MetaValue, Operation, Owner, Register, RegisterError,
    RegisterOptions, TransactionHandler, TransactionOptions,
};
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

/// Records every transaction it performs as `"<tag> <op> <reg>=<value>"`.
#[derive(Debug)]
struct Recorder {
    tag: &'static str,
    reads: bool,
    base: Option<u64>,
    log: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    fn record(&self, op: Operation, register: &Register, options: &TransactionOptions) {
        let value = register
            .data()
            .map_or_else(|| "?".to_owned(), |d| format!("{d:#x}"));
        let mut line = format!("{} {op} {}={value}", self.tag, register.name());
        if let Some(MetaValue::Str(note)) = options.get("note") {
            line.push_str(&format!(" ({note})"));
        }
        self.log.borrow_mut().push(line);
    }
}

impl TransactionHandler for Recorder {
    fn supports(&self, operation: Operation) -> bool {
        operation == Operation::Write || self.reads
    }

    fn write_register(&self, register: &Register, options: &TransactionOptions) {
        self.record(Operation::Write, register, options);
    }

    fn read_register(&self, register: &Register, options: &TransactionOptions) {
        self.record(Operation::Read, register, options);
    }

    fn base_address(&self, _register: &Register) -> Option<u64> {
        self.base
    }
}

impl Owner for Recorder {
    fn transaction_handler(&self) -> Option<&dyn TransactionHandler> {
        Some(self)
    }
}

#[derive(Debug)]
struct Block {
    controller: Option<Rc<dyn Owner>>,
    parent: Option<Rc<dyn Owner>>,
    base: u64,
}

impl Owner for Block {
    fn class_name(&self) -> &str {
        "Block"
    }

    fn parent(&self) -> Option<Rc<dyn Owner>> {
        self.parent.clone()
    }

    fn controller(&self) -> Option<Rc<dyn Owner>> {
        self.controller.clone()
    }

    fn reg_base_address(&self, _domain: Option<&str>) -> Option<u64> {
        Some(self.base)
    }
}

fn recorder(
    tag: &'static str,
    reads: bool,
    base: Option<u64>,
    log: &Rc<RefCell<Vec<String>>>,
) -> Rc<dyn Owner> {
    Rc::new(Recorder {
        tag,
        reads,
        base,
        log: Rc::clone(log),
    })
}

fn register_under(block: Block, context: Context) -> Register {
    let owner: Rc<dyn Owner> = Rc::new(block);
    let mut reg = Register::new(
        "status",
        0x04,
        RegisterOptions::new().size(8).owner(owner).context(context),
    )
    .expect("valid register");
    reg.add_bus("code", 0, 8, BitOptions::new().reset(0x11))
        .expect("fits");
    reg
}

#[test]
fn controller_takes_precedence_over_parent_and_top_level() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let block = Block {
        controller: Some(recorder("ctrl", true, None, &log)),
        parent: Some(recorder("parent", true, None, &log)),
        base: 0,
    };
    let context = Context::new().with_top_level(recorder("top", true, None, &log));
    let mut reg = register_under(block, context);

    reg.write_request(Some(0x22), &TransactionOptions::new())
        .expect("handled");
    reg.read_request(None, &TransactionOptions::new().with("note", "poll"))
        .expect("handled");

    assert_eq!(
        *log.borrow(),
        ["ctrl write status=0x22", "ctrl read status=0x22 (poll)"]
    );
}

#[test]
fn unsupported_operations_fall_through_to_the_next_candidate() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let block = Block {
        controller: Some(recorder("ctrl", false, None, &log)),
        parent: None,
        base: 0,
    };
    let context = Context::new().with_top_level(recorder("top", true, None, &log));
    let mut reg = register_under(block, context);

    reg.read_request(Some(0x33), &TransactionOptions::new())
        .expect("top level reads");
    reg.write_request(None, &TransactionOptions::new())
        .expect("controller writes");

    assert_eq!(
        *log.borrow(),
        ["top read status=0x33", "ctrl write status=0x33"]
    );
}

#[test]
fn missing_handler_names_the_operation() {
    let block = Block {
        controller: None,
        parent: None,
        base: 0,
    };
    let mut reg = register_under(block, Context::new());

    let err = reg
        .field_mut("code")
        .expect("declared")
        .write_request(Some(0x1), &TransactionOptions::new())
        .err();
    assert_eq!(
        err,
        Some(RegisterError::MissingHandler {
            register: "status".to_owned(),
            operation: Operation::Write,
        })
    );
    assert_eq!(reg.data(), Some(0x1));
}

#[test]
fn store_request_tags_bits_before_reading() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let block = Block {
        controller: Some(recorder("ctrl", true, None, &log)),
        parent: None,
        base: 0,
    };
    let mut reg = register_under(block, Context::new());

    reg.field_mut("code")
        .expect("declared")
        .store_request(&TransactionOptions::new())
        .expect("handled");
    assert!(reg.all().is_to_be_stored());
    assert_eq!(reg.status_str(Operation::Read), "SS");
    assert_eq!(*log.borrow(), ["ctrl read status=0x11"]);

    reg.clear_flags();
    assert!(!reg.all().is_to_be_stored());
}

#[test]
fn handler_base_address_wins_over_hierarchy() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let with_handler = register_under(
        Block {
            controller: Some(recorder("ctrl", true, Some(0x8000), &log)),
            parent: None,
            base: 0x100,
        },
        Context::new(),
    );
    assert_eq!(with_handler.address(&AddressOptions::default()), 0x8004);

    let without_handler = register_under(
        Block {
            controller: None,
            parent: None,
            base: 0x100,
        },
        Context::new(),
    );
    assert_eq!(without_handler.address(&AddressOptions::default()), 0x104);
    assert_eq!(without_handler.address(&AddressOptions::relative()), 0x04);
}

#[test]
fn operation_names_parse_from_text() {
    assert_eq!("write_register".parse::<Operation>(), Ok(Operation::Write));
    assert!(matches!(
        "erase".parse::<Operation>(),
        Err(RegisterError::UnsupportedOperation(_))
    ));
}

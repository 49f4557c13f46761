use std::collections::HashMap;

use crate::header::ident::ElfEndian;
use crate::reader::Reader;
use crate::Error;

/// This enum represents one decoded operation of a DWARF location or constant expression. Every
/// registered DWARF v4 opcode has its own variant, the typed v5 operations and the common GNU
/// extensions are recognised, and unregistered opcodes are preserved byte-for-byte in
/// [Operation::Unknown] so that the describe path never has to fail.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Operation {
    // Literals
    Addr(u64),
    Const1u(u8),
    Const1s(i8),
    Const2u(u16),
    Const2s(i16),
    Const4u(u32),
    Const4s(i32),
    Const8u(u64),
    Const8s(i64),
    Constu(u64),
    Consts(i64),
    Lit(u8),

    // Register and frame locations
    Reg(u8),
    Breg(u8, i64),
    Regx(u64),
    Bregx(u64, i64),
    Fbreg(i64),
    CallFrameCfa,

    // Stack manipulation
    Dup,
    Drop,
    Over,
    Pick(u8),
    Swap,
    Rot,

    // Arithmetic and logic
    Abs,
    And,
    Or,
    Xor,
    Not,
    Neg,
    Plus,
    PlusUconst(u64),
    Minus,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Shra,

    // Comparisons
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Control flow
    Skip(i16),
    Bra(i16),
    Call2(u16),
    Call4(u32),
    CallRef(u32),
    Nop,

    // Memory access
    Deref,
    DerefSize(u8),
    Xderef,
    XderefSize(u8),
    PushObjectAddress,
    FormTlsAddress,

    // Composition
    Piece(u64),
    BitPiece(u64, u64),
    ImplicitValue(Vec<u8>),
    StackValue,

    // Typed operations (DWARF v5)
    ImplicitPointer(u32, i64),
    Addrx(u64),
    Constx(u64),
    EntryValue(Vec<u8>),
    ConstType(u64, Vec<u8>),
    RegvalType(u64, u64),
    DerefType(u8, u64),
    XderefType(u8, u64),
    Convert(u64),
    Reinterpret(u64),

    // GNU extensions
    GnuPushTlsAddress,
    GnuUninit,
    GnuImplicitPointer(u32, i64),
    GnuEntryValue(Vec<u8>),
    GnuConstType(u64, Vec<u8>),
    GnuRegvalType(u64, u64),
    GnuDerefType(u8, u64),
    GnuConvert(u64),
    GnuReinterpret(u64),
    GnuParameterRef(u32),
    GnuAddrIndex(u64),
    GnuConstIndex(u64),

    Unknown(u8),
}

/// One decoded operation together with its byte position inside of the expression, needed to
/// resolve `skip`/`bra` targets.
#[derive(Clone, Eq, PartialEq, Debug)]
struct Located {
    offset: usize,
    next_offset: usize,
    operation: Operation,
}

/// This enum represents the kind of result an evaluation produced: a plain value, or one of the
/// location kinds of the DWARF location model.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum EvaluationResult {
    /// The expression computed a value (the common case for constant expressions).
    Value(u64),

    /// The object lives in the specified register.
    Register(u64),

    /// The object lives in memory at the offset carried by the specified register. Produced
    /// without numeric result when no register context is available.
    RegisterOffset { register: u64, offset: i64 },

    /// The object lives at the specified offset from the frame base.
    FrameOffset(i64),

    /// The object lives in memory at the specified address.
    Memory(u64),

    /// The value is known without occupying storage.
    Implicit(Vec<u8>),

    /// The object is composed from the listed pieces.
    Composite(Vec<Piece>),
}

/// One piece of a composite location: a byte or bit span taken from the location computed
/// before the piece operation.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Piece {
    pub size_bits: u64,
    pub bit_offset: u64,
    pub location: Option<Box<EvaluationResult>>,
}

/// This trait supplies the external context an evaluation may need: target memory, register
/// contents, the frame base and the canonical frame address. Every accessor defaults to "not
/// available"; the evaluator degrades to symbolic results or typed errors accordingly.
pub trait EvaluationContext {
    fn read_memory(&self, _address: u64, _size: u8) -> Option<u64> {
        None
    }
    fn register(&self, _register: u64) -> Option<u64> {
        None
    }
    fn frame_base(&self) -> Option<u64> {
        None
    }
    fn call_frame_cfa(&self) -> Option<u64> {
        None
    }
}

/// The empty evaluation context: no memory, no registers, no frame.
pub struct NoContext;

impl EvaluationContext for NoContext {}

/// This structure decodes and runs DWARF expressions. The address size comes from the
/// surrounding compilation unit and applies to the `addr` operation.
pub struct Expression<'a> {
    bytecode: &'a [u8],
    endian: ElfEndian,
    address_size: u8,
}

impl<'a> Expression<'a> {
    /// This function creates an expression over the specified bytecode.
    pub fn new(bytecode: &'a [u8], endian: ElfEndian, address_size: u8) -> Self {
        Self {
            bytecode,
            endian,
            address_size,
        }
    }

    /// This function decodes the bytecode into its operation sequence. Unknown opcodes become
    /// [Operation::Unknown] and consume exactly one byte; whether that is tolerable is decided
    /// by the caller (describe tolerates, evaluate does not).
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Truncated] - An operand is cut short
    pub fn operations(&self) -> Result<Vec<Operation>, Error> {
        Ok(self
            .located_operations()?
            .into_iter()
            .map(|located| located.operation)
            .collect())
    }

    fn located_operations(&self) -> Result<Vec<Located>, Error> {
        let mut reader = Reader::new(self.bytecode, self.endian);
        let mut operations = Vec::new();
        while !reader.is_empty() {
            let offset = reader.position();
            let operation = self.decode_one(&mut reader)?;
            operations.push(Located {
                offset,
                next_offset: reader.position(),
                operation,
            });
        }
        Ok(operations)
    }

    fn decode_one(&self, reader: &mut Reader<'a>) -> Result<Operation, Error> {
        let opcode = reader.read_u8()?;
        Ok(match opcode {
            0x03 => Operation::Addr(reader.read_address(self.address_size)?),
            0x06 => Operation::Deref,
            0x08 => Operation::Const1u(reader.read_u8()?),
            0x09 => Operation::Const1s(reader.read_i8()?),
            0x0A => Operation::Const2u(reader.read_u16()?),
            0x0B => Operation::Const2s(reader.read::<i16>()?),
            0x0C => Operation::Const4u(reader.read_u32()?),
            0x0D => Operation::Const4s(reader.read::<i32>()?),
            0x0E => Operation::Const8u(reader.read_u64()?),
            0x0F => Operation::Const8s(reader.read::<i64>()?),
            0x10 => Operation::Constu(reader.read_uleb()?.0),
            0x11 => Operation::Consts(reader.read_sleb()?.0),
            0x12 => Operation::Dup,
            0x13 => Operation::Drop,
            0x14 => Operation::Over,
            0x15 => Operation::Pick(reader.read_u8()?),
            0x16 => Operation::Swap,
            0x17 => Operation::Rot,
            0x18 => Operation::Xderef,
            0x19 => Operation::Abs,
            0x1A => Operation::And,
            0x1B => Operation::Div,
            0x1C => Operation::Minus,
            0x1D => Operation::Mod,
            0x1E => Operation::Mul,
            0x1F => Operation::Neg,
            0x20 => Operation::Not,
            0x21 => Operation::Or,
            0x22 => Operation::Plus,
            0x23 => Operation::PlusUconst(reader.read_uleb()?.0),
            0x24 => Operation::Shl,
            0x25 => Operation::Shr,
            0x26 => Operation::Shra,
            0x27 => Operation::Xor,
            0x28 => Operation::Bra(reader.read::<i16>()?),
            0x29 => Operation::Eq,
            0x2A => Operation::Ge,
            0x2B => Operation::Gt,
            0x2C => Operation::Le,
            0x2D => Operation::Lt,
            0x2E => Operation::Ne,
            0x2F => Operation::Skip(reader.read::<i16>()?),
            0x30..=0x4F => Operation::Lit(opcode - 0x30),
            0x50..=0x6F => Operation::Reg(opcode - 0x50),
            0x70..=0x8F => Operation::Breg(opcode - 0x70, reader.read_sleb()?.0),
            0x90 => Operation::Regx(reader.read_uleb()?.0),
            0x91 => Operation::Fbreg(reader.read_sleb()?.0),
            0x92 => {
                let (register, _) = reader.read_uleb()?;
                Operation::Bregx(register, reader.read_sleb()?.0)
            }
            0x93 => Operation::Piece(reader.read_uleb()?.0),
            0x94 => Operation::DerefSize(reader.read_u8()?),
            0x95 => Operation::XderefSize(reader.read_u8()?),
            0x96 => Operation::Nop,
            0x97 => Operation::PushObjectAddress,
            0x98 => Operation::Call2(reader.read_u16()?),
            0x99 => Operation::Call4(reader.read_u32()?),
            0x9A => Operation::CallRef(reader.read_u32()?),
            0x9B => Operation::FormTlsAddress,
            0x9C => Operation::CallFrameCfa,
            0x9D => {
                let (size, _) = reader.read_uleb()?;
                Operation::BitPiece(size, reader.read_uleb()?.0)
            }
            0x9E => {
                let (length, _) = reader.read_uleb()?;
                Operation::ImplicitValue(reader.read_block(length as usize)?)
            }
            0x9F => Operation::StackValue,
            0xA0 => {
                let offset = reader.read_u32()?;
                Operation::ImplicitPointer(offset, reader.read_sleb()?.0)
            }
            0xA1 => Operation::Addrx(reader.read_uleb()?.0),
            0xA2 => Operation::Constx(reader.read_uleb()?.0),
            0xA3 => {
                let (length, _) = reader.read_uleb()?;
                Operation::EntryValue(reader.read_block(length as usize)?)
            }
            0xA4 => {
                let (base_type, _) = reader.read_uleb()?;
                let length = reader.read_u8()? as usize;
                Operation::ConstType(base_type, reader.read_block(length)?)
            }
            0xA5 => {
                let (register, _) = reader.read_uleb()?;
                Operation::RegvalType(register, reader.read_uleb()?.0)
            }
            0xA6 => {
                let size = reader.read_u8()?;
                Operation::DerefType(size, reader.read_uleb()?.0)
            }
            0xA7 => {
                let size = reader.read_u8()?;
                Operation::XderefType(size, reader.read_uleb()?.0)
            }
            0xA8 => Operation::Convert(reader.read_uleb()?.0),
            0xA9 => Operation::Reinterpret(reader.read_uleb()?.0),
            0xE0 => Operation::GnuPushTlsAddress,
            0xF0 => Operation::GnuUninit,
            0xF2 => {
                let offset = reader.read_u32()?;
                Operation::GnuImplicitPointer(offset, reader.read_sleb()?.0)
            }
            0xF3 => {
                let (length, _) = reader.read_uleb()?;
                Operation::GnuEntryValue(reader.read_block(length as usize)?)
            }
            0xF4 => {
                let (base_type, _) = reader.read_uleb()?;
                let length = reader.read_u8()? as usize;
                Operation::GnuConstType(base_type, reader.read_block(length)?)
            }
            0xF5 => {
                let (register, _) = reader.read_uleb()?;
                Operation::GnuRegvalType(register, reader.read_uleb()?.0)
            }
            0xF6 => {
                let size = reader.read_u8()?;
                Operation::GnuDerefType(size, reader.read_uleb()?.0)
            }
            0xF7 => Operation::GnuConvert(reader.read_uleb()?.0),
            0xF9 => Operation::GnuReinterpret(reader.read_uleb()?.0),
            0xFA => Operation::GnuParameterRef(reader.read_u32()?),
            0xFB => Operation::GnuAddrIndex(reader.read_uleb()?.0),
            0xFC => Operation::GnuConstIndex(reader.read_uleb()?.0),
            opcode => Operation::Unknown(opcode),
        })
    }

    /// This function renders the operation sequence as a stable, deterministic text. Unknown
    /// opcodes do not fail here; they render with their raw byte. Operand-bearing operations
    /// render their operands in hex, addresses padded to the address size of the unit.
    pub fn describe(&self) -> Result<String, Error> {
        let operations = self.operations()?;
        let rendered: Vec<String> = operations
            .iter()
            .map(|operation| self.describe_one(operation))
            .collect();
        Ok(rendered.join("; "))
    }

    fn describe_one(&self, operation: &Operation) -> String {
        fn hex(value: i64) -> String {
            if value < 0 {
                format!("-0x{:x}", value.unsigned_abs())
            } else {
                format!("0x{value:x}")
            }
        }

        match operation {
            Operation::Addr(address) => {
                let width = self.address_size as usize * 2;
                format!("addr(0x{address:0width$x})")
            }
            Operation::Const1u(value) => format!("const1u(0x{value:x})"),
            Operation::Const1s(value) => format!("const1s({})", hex(*value as i64)),
            Operation::Const2u(value) => format!("const2u(0x{value:x})"),
            Operation::Const2s(value) => format!("const2s({})", hex(*value as i64)),
            Operation::Const4u(value) => format!("const4u(0x{value:x})"),
            Operation::Const4s(value) => format!("const4s({})", hex(*value as i64)),
            Operation::Const8u(value) => format!("const8u(0x{value:x})"),
            Operation::Const8s(value) => format!("const8s({})", hex(*value)),
            Operation::Constu(value) => format!("constu(0x{value:x})"),
            Operation::Consts(value) => format!("consts({})", hex(*value)),
            Operation::Lit(value) => format!("lit{value}"),
            Operation::Reg(register) => format!("reg{register}"),
            Operation::Breg(register, offset) => format!("breg{register}({})", hex(*offset)),
            Operation::Regx(register) => format!("regx(0x{register:x})"),
            Operation::Bregx(register, offset) => {
                format!("bregx(0x{register:x}, {})", hex(*offset))
            }
            Operation::Fbreg(offset) => format!("fbreg({})", hex(*offset)),
            Operation::CallFrameCfa => "call_frame_cfa".to_string(),
            Operation::Dup => "dup".to_string(),
            Operation::Drop => "drop".to_string(),
            Operation::Over => "over".to_string(),
            Operation::Pick(index) => format!("pick(0x{index:x})"),
            Operation::Swap => "swap".to_string(),
            Operation::Rot => "rot".to_string(),
            Operation::Abs => "abs".to_string(),
            Operation::And => "and".to_string(),
            Operation::Or => "or".to_string(),
            Operation::Xor => "xor".to_string(),
            Operation::Not => "not".to_string(),
            Operation::Neg => "neg".to_string(),
            Operation::Plus => "plus".to_string(),
            Operation::PlusUconst(value) => format!("plus_uconst(0x{value:x})"),
            Operation::Minus => "minus".to_string(),
            Operation::Mul => "mul".to_string(),
            Operation::Div => "div".to_string(),
            Operation::Mod => "mod".to_string(),
            Operation::Shl => "shl".to_string(),
            Operation::Shr => "shr".to_string(),
            Operation::Shra => "shra".to_string(),
            Operation::Eq => "eq".to_string(),
            Operation::Ne => "ne".to_string(),
            Operation::Lt => "lt".to_string(),
            Operation::Le => "le".to_string(),
            Operation::Gt => "gt".to_string(),
            Operation::Ge => "ge".to_string(),
            Operation::Skip(offset) => format!("skip({})", hex(*offset as i64)),
            Operation::Bra(offset) => format!("bra({})", hex(*offset as i64)),
            Operation::Call2(target) => format!("call2(0x{target:x})"),
            Operation::Call4(target) => format!("call4(0x{target:x})"),
            Operation::CallRef(target) => format!("call_ref(0x{target:x})"),
            Operation::Nop => "nop".to_string(),
            Operation::Deref => "deref".to_string(),
            Operation::DerefSize(size) => format!("deref_size(0x{size:x})"),
            Operation::Xderef => "xderef".to_string(),
            Operation::XderefSize(size) => format!("xderef_size(0x{size:x})"),
            Operation::PushObjectAddress => "push_object_address".to_string(),
            Operation::FormTlsAddress => "form_tls_address".to_string(),
            Operation::Piece(size) => format!("piece(0x{size:x})"),
            Operation::BitPiece(size, offset) => format!("bit_piece(0x{size:x}, 0x{offset:x})"),
            Operation::ImplicitValue(bytes) => format!("implicit_value({})", hex_bytes(bytes)),
            Operation::StackValue => "stack_value".to_string(),
            Operation::ImplicitPointer(offset, adjust) => {
                format!("implicit_pointer(0x{offset:x}, {})", hex(*adjust))
            }
            Operation::Addrx(index) => format!("addrx(0x{index:x})"),
            Operation::Constx(index) => format!("constx(0x{index:x})"),
            Operation::EntryValue(bytes) => format!("entry_value({})", hex_bytes(bytes)),
            Operation::ConstType(base_type, bytes) => {
                format!("const_type(0x{base_type:x}, {})", hex_bytes(bytes))
            }
            Operation::RegvalType(register, base_type) => {
                format!("regval_type(0x{register:x}, 0x{base_type:x})")
            }
            Operation::DerefType(size, base_type) => {
                format!("deref_type(0x{size:x}, 0x{base_type:x})")
            }
            Operation::XderefType(size, base_type) => {
                format!("xderef_type(0x{size:x}, 0x{base_type:x})")
            }
            Operation::Convert(base_type) => format!("convert(0x{base_type:x})"),
            Operation::Reinterpret(base_type) => format!("reinterpret(0x{base_type:x})"),
            Operation::GnuPushTlsAddress => "GNU_push_tls_address".to_string(),
            Operation::GnuUninit => "GNU_uninit".to_string(),
            Operation::GnuImplicitPointer(offset, adjust) => {
                format!("GNU_implicit_pointer(0x{offset:x}, {})", hex(*adjust))
            }
            Operation::GnuEntryValue(bytes) => format!("GNU_entry_value({})", hex_bytes(bytes)),
            Operation::GnuConstType(base_type, bytes) => {
                format!("GNU_const_type(0x{base_type:x}, {})", hex_bytes(bytes))
            }
            Operation::GnuRegvalType(register, base_type) => {
                format!("GNU_regval_type(0x{register:x}, 0x{base_type:x})")
            }
            Operation::GnuDerefType(size, base_type) => {
                format!("GNU_deref_type(0x{size:x}, 0x{base_type:x})")
            }
            Operation::GnuConvert(base_type) => format!("GNU_convert(0x{base_type:x})"),
            Operation::GnuReinterpret(base_type) => format!("GNU_reinterpret(0x{base_type:x})"),
            Operation::GnuParameterRef(target) => format!("GNU_parameter_ref(0x{target:x})"),
            Operation::GnuAddrIndex(index) => format!("GNU_addr_index(0x{index:x})"),
            Operation::GnuConstIndex(index) => format!("GNU_const_index(0x{index:x})"),
            Operation::Unknown(opcode) => format!("<unk 0x{opcode:02x}>"),
        }
    }

    /// This function evaluates the expression over a 64-bit operand stack. A register, frame or
    /// memory reference that the context cannot satisfy either becomes a symbolic location
    /// result (when it stands alone) or fails with [Error::Unsupported] (when the expression
    /// computes further with it).
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::StackUnderflow] - An operation pops more values than the stack holds
    /// - [Error::UnknownOpcode] - The bytecode uses an unregistered opcode
    /// - [Error::Unsupported] - A typed v5 operation, an unresolvable reference or a branch
    ///   outside of the expression
    /// - [Error::Truncated] - An operand is cut short
    pub fn evaluate(&self, context: &dyn EvaluationContext) -> Result<EvaluationResult, Error> {
        let operations = self.located_operations()?;

        // Single register/frame operations describe a location without needing any numeric
        // context; handle them before the numeric run.
        if operations.len() == 1 {
            match &operations[0].operation {
                Operation::Reg(register) => {
                    return Ok(EvaluationResult::Register(*register as u64))
                }
                Operation::Regx(register) => return Ok(EvaluationResult::Register(*register)),
                Operation::Breg(register, offset) if context.register(*register as u64).is_none() => {
                    return Ok(EvaluationResult::RegisterOffset {
                        register: *register as u64,
                        offset: *offset,
                    })
                }
                Operation::Bregx(register, offset) if context.register(*register).is_none() => {
                    return Ok(EvaluationResult::RegisterOffset {
                        register: *register,
                        offset: *offset,
                    })
                }
                Operation::Fbreg(offset) if context.frame_base().is_none() => {
                    return Ok(EvaluationResult::FrameOffset(*offset))
                }
                _ => {}
            }
        }

        let offset_to_index: HashMap<usize, usize> = operations
            .iter()
            .enumerate()
            .map(|(index, located)| (located.offset, index))
            .collect();

        let mut stack: Vec<u64> = Vec::new();
        let mut pieces: Vec<Piece> = Vec::new();
        let mut register_location: Option<u64> = None;
        let mut implicit: Option<Vec<u8>> = None;
        let mut stack_value = false;
        let mut pc = 0usize;

        macro_rules! pop {
            () => {
                stack.pop().ok_or(Error::StackUnderflow)?
            };
        }
        macro_rules! binary {
            ($op: expr) => {{
                let right = pop!();
                let left = pop!();
                let func: fn(u64, u64) -> u64 = $op;
                stack.push(func(left, right));
            }};
        }
        macro_rules! compare {
            ($op: expr) => {{
                let right = pop!() as i64;
                let left = pop!() as i64;
                let func: fn(i64, i64) -> bool = $op;
                stack.push(func(left, right) as u64);
            }};
        }

        while pc < operations.len() {
            let located = &operations[pc];
            let mut next_pc = pc + 1;
            match &located.operation {
                Operation::Addr(address) => stack.push(*address),
                Operation::Const1u(value) => stack.push(*value as u64),
                Operation::Const1s(value) => stack.push(*value as i64 as u64),
                Operation::Const2u(value) => stack.push(*value as u64),
                Operation::Const2s(value) => stack.push(*value as i64 as u64),
                Operation::Const4u(value) => stack.push(*value as u64),
                Operation::Const4s(value) => stack.push(*value as i64 as u64),
                Operation::Const8u(value) => stack.push(*value),
                Operation::Const8s(value) => stack.push(*value as u64),
                Operation::Constu(value) => stack.push(*value),
                Operation::Consts(value) => stack.push(*value as u64),
                Operation::Lit(value) => stack.push(*value as u64),

                Operation::Reg(register) => register_location = Some(*register as u64),
                Operation::Regx(register) => register_location = Some(*register),
                Operation::Breg(register, offset) => {
                    let base = context
                        .register(*register as u64)
                        .ok_or(Error::Unsupported("register context"))?;
                    stack.push(base.wrapping_add_signed(*offset));
                }
                Operation::Bregx(register, offset) => {
                    let base = context
                        .register(*register)
                        .ok_or(Error::Unsupported("register context"))?;
                    stack.push(base.wrapping_add_signed(*offset));
                }
                Operation::Fbreg(offset) => {
                    let base = context
                        .frame_base()
                        .ok_or(Error::Unsupported("frame base context"))?;
                    stack.push(base.wrapping_add_signed(*offset));
                }
                Operation::CallFrameCfa => {
                    let cfa = context
                        .call_frame_cfa()
                        .ok_or(Error::Unsupported("call frame context"))?;
                    stack.push(cfa);
                }

                Operation::Dup => {
                    let top = *stack.last().ok_or(Error::StackUnderflow)?;
                    stack.push(top);
                }
                Operation::Drop => {
                    pop!();
                }
                Operation::Over => {
                    let index = stack.len().checked_sub(2).ok_or(Error::StackUnderflow)?;
                    stack.push(stack[index]);
                }
                Operation::Pick(index) => {
                    let index = stack
                        .len()
                        .checked_sub(1 + *index as usize)
                        .ok_or(Error::StackUnderflow)?;
                    stack.push(stack[index]);
                }
                Operation::Swap => {
                    let top = pop!();
                    let below = pop!();
                    stack.push(top);
                    stack.push(below);
                }
                Operation::Rot => {
                    let first = pop!();
                    let second = pop!();
                    let third = pop!();
                    stack.push(first);
                    stack.push(third);
                    stack.push(second);
                }

                Operation::Abs => {
                    let top = pop!() as i64;
                    stack.push(top.unsigned_abs());
                }
                Operation::And => binary!(|left, right| left & right),
                Operation::Or => binary!(|left, right| left | right),
                Operation::Xor => binary!(|left, right| left ^ right),
                Operation::Not => {
                    let top = pop!();
                    stack.push(!top);
                }
                Operation::Neg => {
                    let top = pop!() as i64;
                    stack.push(top.wrapping_neg() as u64);
                }
                Operation::Plus => binary!(u64::wrapping_add),
                Operation::PlusUconst(value) => {
                    let top = pop!();
                    stack.push(top.wrapping_add(*value));
                }
                Operation::Minus => binary!(|left, right| left.wrapping_sub(right)),
                Operation::Mul => binary!(u64::wrapping_mul),
                Operation::Div => {
                    let right = pop!() as i64;
                    let left = pop!() as i64;
                    if right == 0 {
                        return Err(Error::Unsupported("division by zero"));
                    }
                    stack.push(left.wrapping_div(right) as u64);
                }
                Operation::Mod => {
                    let right = pop!() as i64;
                    let left = pop!() as i64;
                    if right == 0 {
                        return Err(Error::Unsupported("division by zero"));
                    }
                    stack.push(left.wrapping_rem(right) as u64);
                }
                Operation::Shl => binary!(|left, right| {
                    if right >= 64 { 0 } else { left << right }
                }),
                Operation::Shr => binary!(|left, right| {
                    if right >= 64 { 0 } else { left >> right }
                }),
                Operation::Shra => binary!(|left, right| {
                    let left = left as i64;
                    if right >= 64 {
                        if left < 0 { u64::MAX } else { 0 }
                    } else {
                        (left >> right) as u64
                    }
                }),

                Operation::Eq => compare!(|left, right| left == right),
                Operation::Ne => compare!(|left, right| left != right),
                Operation::Lt => compare!(|left, right| left < right),
                Operation::Le => compare!(|left, right| left <= right),
                Operation::Gt => compare!(|left, right| left > right),
                Operation::Ge => compare!(|left, right| left >= right),

                Operation::Skip(offset) => {
                    next_pc = self.branch_target(&offset_to_index, located, *offset)?;
                }
                Operation::Bra(offset) => {
                    if pop!() != 0 {
                        next_pc = self.branch_target(&offset_to_index, located, *offset)?;
                    }
                }
                Operation::Call2(_) | Operation::Call4(_) | Operation::CallRef(_) => {
                    return Err(Error::Unsupported("expression calls"));
                }
                Operation::Nop => {}

                Operation::Deref => {
                    let address = pop!();
                    let value = context
                        .read_memory(address, self.address_size)
                        .ok_or(Error::Unsupported("memory context"))?;
                    stack.push(value);
                }
                Operation::DerefSize(size) => {
                    let address = pop!();
                    let value = context
                        .read_memory(address, *size)
                        .ok_or(Error::Unsupported("memory context"))?;
                    stack.push(value);
                }
                Operation::Xderef | Operation::XderefSize(_) => {
                    return Err(Error::Unsupported("extended dereference"));
                }
                Operation::PushObjectAddress | Operation::FormTlsAddress => {
                    return Err(Error::Unsupported("object address context"));
                }

                Operation::Piece(size) => {
                    let location = self.piece_location(
                        &mut stack,
                        &mut register_location,
                        &mut implicit,
                        &mut stack_value,
                    );
                    pieces.push(Piece {
                        size_bits: size * 8,
                        bit_offset: 0,
                        location,
                    });
                }
                Operation::BitPiece(size, offset) => {
                    let location = self.piece_location(
                        &mut stack,
                        &mut register_location,
                        &mut implicit,
                        &mut stack_value,
                    );
                    pieces.push(Piece {
                        size_bits: *size,
                        bit_offset: *offset,
                        location,
                    });
                }
                Operation::ImplicitValue(bytes) => implicit = Some(bytes.clone()),
                Operation::StackValue => stack_value = true,

                Operation::ImplicitPointer(..)
                | Operation::Addrx(_)
                | Operation::Constx(_)
                | Operation::EntryValue(_)
                | Operation::ConstType(..)
                | Operation::RegvalType(..)
                | Operation::DerefType(..)
                | Operation::XderefType(..)
                | Operation::Convert(_)
                | Operation::Reinterpret(_) => {
                    return Err(Error::Unsupported("typed operation"));
                }
                Operation::GnuPushTlsAddress
                | Operation::GnuUninit
                | Operation::GnuImplicitPointer(..)
                | Operation::GnuEntryValue(_)
                | Operation::GnuConstType(..)
                | Operation::GnuRegvalType(..)
                | Operation::GnuDerefType(..)
                | Operation::GnuConvert(_)
                | Operation::GnuReinterpret(_)
                | Operation::GnuParameterRef(_)
                | Operation::GnuAddrIndex(_)
                | Operation::GnuConstIndex(_) => {
                    return Err(Error::Unsupported("GNU extension"));
                }
                Operation::Unknown(opcode) => return Err(Error::UnknownOpcode(*opcode)),
            }
            pc = next_pc;
        }

        if !pieces.is_empty() {
            return Ok(EvaluationResult::Composite(pieces));
        }
        if let Some(bytes) = implicit {
            return Ok(EvaluationResult::Implicit(bytes));
        }
        if let Some(register) = register_location {
            return Ok(EvaluationResult::Register(register));
        }
        let top = stack.pop().ok_or(Error::StackUnderflow)?;
        Ok(EvaluationResult::Value(top))
    }

    fn branch_target(
        &self,
        offset_to_index: &HashMap<usize, usize>,
        located: &Located,
        offset: i16,
    ) -> Result<usize, Error> {
        let target = located.next_offset as i64 + offset as i64;
        if target == self.bytecode.len() as i64 {
            // Branching directly behind the last operation ends the evaluation.
            return Ok(usize::MAX);
        }
        usize::try_from(target)
            .ok()
            .and_then(|target| offset_to_index.get(&target).copied())
            .ok_or(Error::Unsupported("branch target"))
    }

    fn piece_location(
        &self,
        stack: &mut Vec<u64>,
        register_location: &mut Option<u64>,
        implicit: &mut Option<Vec<u8>>,
        stack_value: &mut bool,
    ) -> Option<Box<EvaluationResult>> {
        let location = if let Some(register) = register_location.take() {
            Some(EvaluationResult::Register(register))
        } else if let Some(bytes) = implicit.take() {
            Some(EvaluationResult::Implicit(bytes))
        } else if *stack_value {
            *stack_value = false;
            stack.pop().map(EvaluationResult::Value)
        } else {
            stack.pop().map(EvaluationResult::Memory)
        };
        location.map(Box::new)
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    let rendered: Vec<String> = bytes.iter().map(|byte| format!("0x{byte:02x}")).collect();
    format!("[{}]", rendered.join(" "))
}

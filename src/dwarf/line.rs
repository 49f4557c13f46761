use serde::{Deserialize, Serialize};

use crate::header::ident::ElfEndian;
use crate::reader::Reader;
use crate::Error;

/// This structure represents one file entry of the line-program header: the path, the index of
/// the include directory it was found in, its modification time and its length (both zero when
/// the producer did not record them).
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub directory_index: u64,
    pub modification_time: u64,
    pub length: u64,
}

/// This enum represents one structurally decoded instruction of the line-number program:
/// special opcodes carry their adjusted opcode byte, standard opcodes their LEB operands,
/// extended opcodes their sub-opcode and payload. The program is decoded, not executed; this
/// library does not run the line-table state machine.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum LineInstruction {
    /// A special opcode (>= opcode_base); advances address and line in one byte.
    Special(u8),

    /// A standard opcode with its operands, decoded per the standard-opcode-lengths table.
    Standard { opcode: u8, operands: Vec<u64> },

    /// `DW_LNE_end_sequence`.
    EndSequence,

    /// `DW_LNE_set_address` with an address of the program's address size.
    SetAddress(u64),

    /// `DW_LNE_define_file` (v4 and below).
    DefineFile(FileEntry),

    /// `DW_LNE_set_discriminator`.
    SetDiscriminator(u64),

    /// Any other extended opcode, payload preserved as raw bytes.
    Extended { opcode: u8, payload: Vec<u8> },
}

/// This structure represents the decoded header of one line-number program plus the raw opcode
/// stream behind it. The header fields follow the DWARF line-table layout; the header-length
/// field is 2 bytes in version 2 programs and 4 bytes from version 3 on.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct LineNumberProgram {
    /// This field holds the length of the program, not counting the length field itself.
    pub unit_length: u32,

    /// This field holds the version of the line-number information, independent of the DWARF
    /// version of the debug information.
    pub version: u16,

    /// This field holds the count of bytes between the end of this field and the first opcode.
    pub header_length: u64,

    /// This field holds the size in bytes of the smallest target instruction.
    pub minimum_instruction_length: u8,

    /// This field holds the maximum count of operations per instruction (1 everywhere except
    /// VLIW targets; present from version 4 on).
    pub maximum_operations_per_instruction: u8,

    /// This field holds the initial value of the `is_stmt` register.
    pub default_is_stmt: bool,

    /// This field affects the meaning of the special opcodes.
    pub line_base: i8,

    /// This field affects the meaning of the special opcodes.
    pub line_range: u8,

    /// This field holds the number assigned to the first special opcode.
    pub opcode_base: u8,

    /// This field holds the operand count of each standard opcode, indexed by opcode minus one.
    pub standard_opcode_lengths: Vec<u8>,

    /// This field holds the include directories, terminated on the wire by an empty string.
    pub include_directories: Vec<String>,

    /// This field holds the file entries, terminated on the wire by an empty name.
    pub file_names: Vec<FileEntry>,

    /// This field holds the raw opcode stream of the program.
    pub program: Vec<u8>,
}

impl LineNumberProgram {
    /// This function parses one line-number program starting at the current position of the
    /// reader and leaves the reader behind its end, so that consecutive programs of a
    /// `.debug_line` section can be read in a row.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Truncated] - The header or the opcode stream is cut short
    pub fn read(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let unit_start = reader.position();
        let unit_length = reader.read_u32()?;
        let unit_end = unit_start + 4 + unit_length as usize;
        let version = reader.read_u16()?;
        let header_length = if version == 2 {
            reader.read_u16()? as u64
        } else {
            reader.read_u32()? as u64
        };
        let minimum_instruction_length = reader.read_u8()?;
        let maximum_operations_per_instruction = if version >= 4 { reader.read_u8()? } else { 1 };
        let default_is_stmt = reader.read_u8()? != 0;
        let line_base = reader.read_i8()?;
        let line_range = reader.read_u8()?;
        let opcode_base = reader.read_u8()?;

        let mut standard_opcode_lengths = Vec::with_capacity(opcode_base.saturating_sub(1) as usize);
        for _ in 1..opcode_base {
            standard_opcode_lengths.push(reader.read_u8()?);
        }

        let mut include_directories = Vec::new();
        loop {
            let (directory, _) = reader.read_cstring_ascii()?;
            if directory.is_empty() {
                break;
            }
            include_directories.push(directory);
        }

        let mut file_names = Vec::new();
        loop {
            let (name, _) = reader.read_cstring_ascii()?;
            if name.is_empty() {
                break;
            }
            file_names.push(FileEntry {
                name,
                directory_index: reader.read_uleb()?.0,
                modification_time: reader.read_uleb()?.0,
                length: reader.read_uleb()?.0,
            });
        }

        let program_length = unit_end.saturating_sub(reader.position());
        let program = reader.read_block(program_length)?;

        Ok(Self {
            unit_length,
            version,
            header_length,
            minimum_instruction_length,
            maximum_operations_per_instruction,
            default_is_stmt,
            line_base,
            line_range,
            opcode_base,
            standard_opcode_lengths,
            include_directories,
            file_names,
            program,
        })
    }

    /// This function decodes the opcode stream into its instruction sequence without running
    /// the line-table state machine. Extended opcodes are framed by their length, so unknown
    /// ones decode cleanly with their payload preserved.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Truncated] - An operand or an extended-opcode payload is cut short
    pub fn instructions(&self, endian: ElfEndian, address_size: u8) -> Result<Vec<LineInstruction>, Error> {
        let mut reader = Reader::new(&self.program, endian);
        let mut instructions = Vec::new();
        while !reader.is_empty() {
            let opcode = reader.read_u8()?;
            if opcode >= self.opcode_base {
                instructions.push(LineInstruction::Special(opcode));
                continue;
            }
            if opcode == 0 {
                // Extended opcode: ULEB length, sub-opcode, payload.
                let (length, _) = reader.read_uleb()?;
                let end = reader.position() + length as usize;
                let sub_opcode = reader.read_u8()?;
                let instruction = match sub_opcode {
                    0x01 => LineInstruction::EndSequence,
                    0x02 => LineInstruction::SetAddress(reader.read_address(address_size)?),
                    0x03 => {
                        let (name, _) = reader.read_cstring_ascii()?;
                        LineInstruction::DefineFile(FileEntry {
                            name,
                            directory_index: reader.read_uleb()?.0,
                            modification_time: reader.read_uleb()?.0,
                            length: reader.read_uleb()?.0,
                        })
                    }
                    0x04 => LineInstruction::SetDiscriminator(reader.read_uleb()?.0),
                    opcode => {
                        let payload = reader.read_block(end.saturating_sub(reader.position()))?;
                        LineInstruction::Extended { opcode, payload }
                    }
                };
                reader.seek(end);
                instructions.push(instruction);
                continue;
            }
            // Standard opcode: the header's length table names the operand count.
            let operand_count = self
                .standard_opcode_lengths
                .get(opcode as usize - 1)
                .copied()
                .unwrap_or(0);
            let mut operands = Vec::with_capacity(operand_count as usize);
            for _ in 0..operand_count {
                // DW_LNS_fixed_advance_pc is the single standard opcode with a non-LEB operand.
                if opcode == 0x09 {
                    operands.push(reader.read_u16()? as u64);
                } else {
                    operands.push(reader.read_uleb()?.0);
                }
            }
            instructions.push(LineInstruction::Standard { opcode, operands });
        }
        Ok(instructions)
    }
}

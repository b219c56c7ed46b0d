//! レジスタアクセス機能

use nix::errno::Errno;
use nix::libc::user_regs_struct;
use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::errors::TargetError;
use crate::Result;

/// x86_64汎用レジスタの論理識別子
///
/// 宣言順は`user_regs_struct`のフィールド順と一致させています。
/// スナップショット内の値参照は記述子テーブル内の位置をオフセットとして
/// 行うためです。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Reg {
    R15,
    R14,
    R13,
    R12,
    Rbp,
    Rbx,
    R11,
    R10,
    R9,
    R8,
    Rax,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    OrigRax,
    Rip,
    Cs,
    Eflags,
    Rsp,
    Ss,
    FsBase,
    GsBase,
    Ds,
    Es,
    Fs,
    Gs,
}

impl Reg {
    /// 記述子テーブル内の位置（スナップショットのワードオフセット）
    fn index(self) -> usize {
        self as usize
    }
}

/// レジスタ記述子
///
/// 論理識別子、DWARFレジスタ番号（対応がない場合は`None`）、表示名を
/// 持つ不変のレコードです。
#[derive(Debug, Clone, Copy)]
pub struct RegisterDescriptor {
    pub reg: Reg,
    pub dwarf: Option<u16>,
    pub name: &'static str,
}

/// 記述子テーブルのエントリ数
pub const REGISTER_COUNT: usize = 27;

/// レジスタ記述子テーブル
///
/// プロセス全体で共有する静的な構成データで、起動時に一度構築したきり
/// 変更しません。DWARF番号はSystem V x86-64 psABIのものです。
/// `orig_rax`と`rip`には対応するDWARF番号がありません。
pub static REGISTER_TABLE: [RegisterDescriptor; REGISTER_COUNT] = [
    RegisterDescriptor { reg: Reg::R15, dwarf: Some(15), name: "r15" },
    RegisterDescriptor { reg: Reg::R14, dwarf: Some(14), name: "r14" },
    RegisterDescriptor { reg: Reg::R13, dwarf: Some(13), name: "r13" },
    RegisterDescriptor { reg: Reg::R12, dwarf: Some(12), name: "r12" },
    RegisterDescriptor { reg: Reg::Rbp, dwarf: Some(6), name: "rbp" },
    RegisterDescriptor { reg: Reg::Rbx, dwarf: Some(3), name: "rbx" },
    RegisterDescriptor { reg: Reg::R11, dwarf: Some(11), name: "r11" },
    RegisterDescriptor { reg: Reg::R10, dwarf: Some(10), name: "r10" },
    RegisterDescriptor { reg: Reg::R9, dwarf: Some(9), name: "r9" },
    RegisterDescriptor { reg: Reg::R8, dwarf: Some(8), name: "r8" },
    RegisterDescriptor { reg: Reg::Rax, dwarf: Some(0), name: "rax" },
    RegisterDescriptor { reg: Reg::Rcx, dwarf: Some(2), name: "rcx" },
    RegisterDescriptor { reg: Reg::Rdx, dwarf: Some(1), name: "rdx" },
    RegisterDescriptor { reg: Reg::Rsi, dwarf: Some(4), name: "rsi" },
    RegisterDescriptor { reg: Reg::Rdi, dwarf: Some(5), name: "rdi" },
    RegisterDescriptor { reg: Reg::OrigRax, dwarf: None, name: "orig_rax" },
    RegisterDescriptor { reg: Reg::Rip, dwarf: None, name: "rip" },
    RegisterDescriptor { reg: Reg::Cs, dwarf: Some(51), name: "cs" },
    RegisterDescriptor { reg: Reg::Eflags, dwarf: Some(49), name: "eflags" },
    RegisterDescriptor { reg: Reg::Rsp, dwarf: Some(7), name: "rsp" },
    RegisterDescriptor { reg: Reg::Ss, dwarf: Some(52), name: "ss" },
    RegisterDescriptor { reg: Reg::FsBase, dwarf: Some(58), name: "fs_base" },
    RegisterDescriptor { reg: Reg::GsBase, dwarf: Some(59), name: "gs_base" },
    RegisterDescriptor { reg: Reg::Ds, dwarf: Some(53), name: "ds" },
    RegisterDescriptor { reg: Reg::Es, dwarf: Some(50), name: "es" },
    RegisterDescriptor { reg: Reg::Fs, dwarf: Some(54), name: "fs" },
    RegisterDescriptor { reg: Reg::Gs, dwarf: Some(55), name: "gs" },
];

// 位置ベースの参照が成立する前提
const _: () = assert!(
    std::mem::size_of::<user_regs_struct>() == std::mem::size_of::<[u64; REGISTER_COUNT]>()
);

/// レジスタ名から記述子を検索する
pub fn lookup_by_name(name: &str) -> Result<&'static RegisterDescriptor> {
    REGISTER_TABLE
        .iter()
        .find(|desc| desc.name == name)
        .ok_or_else(|| TargetError::UnknownRegister {
            name: name.to_string(),
        })
}

/// DWARFレジスタ番号から記述子を検索する
///
/// 対応番号を持たないレジスタ（`orig_rax`、`rip`）がこの検索でヒットする
/// ことはありません。
pub fn lookup_by_dwarf(number: u16) -> Result<&'static RegisterDescriptor> {
    REGISTER_TABLE
        .iter()
        .find(|desc| desc.dwarf == Some(number))
        .ok_or(TargetError::UnknownDwarfNumber { number })
}

/// 論理識別子から表示名を取得する
pub fn name_of(reg: Reg) -> &'static str {
    REGISTER_TABLE[reg.index()].name
}

/// スナップショットを記述子テーブル順の(記述子, 値)の組に展開する
pub fn snapshot_values(
    regs: &user_regs_struct,
) -> Vec<(&'static RegisterDescriptor, u64)> {
    let words = regs_as_words(regs);
    REGISTER_TABLE.iter().zip(words.iter().copied()).collect()
}

/// スナップショットを記述子テーブル順のワード配列として参照する
///
/// `user_regs_struct`は27個の64ビットフィールドだけで構成され、並びは
/// `REGISTER_TABLE`の宣言順と一致します。
fn regs_as_words(regs: &user_regs_struct) -> &[u64; REGISTER_COUNT] {
    unsafe { &*(regs as *const user_regs_struct as *const [u64; REGISTER_COUNT]) }
}

fn regs_as_words_mut(regs: &mut user_regs_struct) -> &mut [u64; REGISTER_COUNT] {
    unsafe { &mut *(regs as *mut user_regs_struct as *mut [u64; REGISTER_COUNT]) }
}

/// レジスタアクセス
pub struct Registers {
    pid: Pid,
}

impl Registers {
    /// レジスタアクセスを作成する
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    /// レジスタファイル全体のスナップショットを取得する
    pub fn read_all(&self) -> Result<user_regs_struct> {
        ptrace::getregs(self.pid).map_err(Self::map_errno)
    }

    /// スナップショット全体を書き戻す
    ///
    /// 下層のPTRACE_SETREGSはレジスタファイル全体を一括で更新するため、
    /// 個別フィールドの変更も必ずスナップショット単位で書き戻します。
    pub fn write_all(&self, regs: user_regs_struct) -> Result<()> {
        ptrace::setregs(self.pid, regs).map_err(Self::map_errno)
    }

    /// 単一レジスタの値を取得する
    pub fn get(&self, reg: Reg) -> Result<u64> {
        let regs = self.read_all()?;
        Ok(regs_as_words(&regs)[reg.index()])
    }

    /// 単一レジスタの値を設定する
    ///
    /// スナップショットを取得して対象フィールドだけを書き換え、全体を
    /// 書き戻します。他のレジスタは直前に観測した値のまま保持されます。
    /// 読み取りと書き戻しの間に他者がプロセスを変更しないこと（停止中で
    /// 単独の制御主体であること）が前提です。
    pub fn set(&self, reg: Reg, value: u64) -> Result<()> {
        let mut regs = self.read_all()?;
        regs_as_words_mut(&mut regs)[reg.index()] = value;
        self.write_all(regs)
    }

    /// プログラムカウンタ（RIP）を取得する
    pub fn get_pc(&self) -> Result<u64> {
        self.get(Reg::Rip)
    }

    /// プログラムカウンタ（RIP）を設定する
    pub fn set_pc(&self, pc: u64) -> Result<()> {
        self.set(Reg::Rip, pc)
    }

    /// 停止していないプロセスへのGETREGS/SETREGSはESRCHになる
    fn map_errno(errno: Errno) -> TargetError {
        match errno {
            Errno::ESRCH => TargetError::NotStopped,
            other => TargetError::Ptrace(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_layout() {
        let mut regs: user_regs_struct = unsafe { std::mem::zeroed() };
        regs.r15 = 0x1111;
        regs.rax = 0x2222;
        regs.orig_rax = 0x3333;
        regs.rip = 0x4444;
        regs.eflags = 0x5555;
        regs.gs = 0x6666;

        let words = regs_as_words(&regs);
        assert_eq!(words[Reg::R15.index()], 0x1111);
        assert_eq!(words[Reg::Rax.index()], 0x2222);
        assert_eq!(words[Reg::OrigRax.index()], 0x3333);
        assert_eq!(words[Reg::Rip.index()], 0x4444);
        assert_eq!(words[Reg::Eflags.index()], 0x5555);
        assert_eq!(words[Reg::Gs.index()], 0x6666);
    }

    #[test]
    fn test_descriptor_table_positions() {
        assert_eq!(REGISTER_TABLE.len(), REGISTER_COUNT);
        for (i, desc) in REGISTER_TABLE.iter().enumerate() {
            assert_eq!(desc.reg.index(), i, "descriptor for {} is out of order", desc.name);
        }
    }

    #[test]
    fn test_descriptor_names_are_unique() {
        for desc in &REGISTER_TABLE {
            let count = REGISTER_TABLE
                .iter()
                .filter(|other| other.name == desc.name)
                .count();
            assert_eq!(count, 1, "duplicate register name {}", desc.name);
        }
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(lookup_by_name("rax").expect("rax exists").reg, Reg::Rax);
        assert_eq!(lookup_by_name("fs_base").expect("fs_base exists").reg, Reg::FsBase);
        assert!(matches!(
            lookup_by_name("xyz"),
            Err(TargetError::UnknownRegister { .. })
        ));
    }

    #[test]
    fn test_lookup_by_dwarf() {
        assert_eq!(lookup_by_dwarf(0).expect("dwarf 0").reg, Reg::Rax);
        assert_eq!(lookup_by_dwarf(6).expect("dwarf 6").reg, Reg::Rbp);
        assert_eq!(lookup_by_dwarf(59).expect("dwarf 59").reg, Reg::GsBase);
        // orig_raxとripは対応番号を持たないので、どの番号でもヒットしない
        assert!(matches!(
            lookup_by_dwarf(1000),
            Err(TargetError::UnknownDwarfNumber { .. })
        ));
    }

    #[test]
    fn test_name_round_trip() {
        for desc in &REGISTER_TABLE {
            assert_eq!(lookup_by_name(desc.name).expect("name exists").reg, desc.reg);
            assert_eq!(name_of(desc.reg), desc.name);
        }
    }
}
